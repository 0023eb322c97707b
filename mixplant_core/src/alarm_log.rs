//! Bounded, newest-first alarm history shared by every detector.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::alarm::AlarmRecord;

pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug)]
pub struct AlarmLog {
    capacity: usize,
    entries: Mutex<VecDeque<AlarmRecord>>,
}

impl Default for AlarmLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl AlarmLog {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    // A panic elsewhere while holding the lock cannot leave the deque in a
    // torn state, so a poisoned lock is still usable.
    fn entries(&self) -> MutexGuard<'_, VecDeque<AlarmRecord>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert at the front; drop the oldest entry beyond capacity.
    pub fn append(&self, record: AlarmRecord) {
        let mut entries = self.entries();
        entries.push_front(record);
        entries.truncate(self.capacity);
    }

    /// Full ordered sequence, newest first.
    pub fn snapshot(&self) -> Vec<AlarmRecord> {
        self.entries().iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<AlarmRecord> {
        self.entries().front().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
