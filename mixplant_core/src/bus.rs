//! Bounded event queue from the pollers to the presentation side.
//!
//! Producers never block: when the queue is full the oldest queued event is
//! discarded to make room, and the discard is counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel as xch;

use crate::alarm::AlarmRecord;
use crate::types::{TankKey, TankState};

#[derive(Debug, Clone, PartialEq)]
pub enum PlantEvent {
    /// One successful poll round. `displayed_valve` is the requested ratio
    /// while a valve write is still settling, otherwise the polled one.
    Snapshot {
        key: TankKey,
        state: TankState,
        displayed_valve: f64,
    },
    Alarm(AlarmRecord),
}

/// Cloneable handle; every clone publishes into and drains from the same queue.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: xch::Sender<PlantEvent>,
    rx: xch::Receiver<PlantEvent>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = xch::bounded(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn publish(&self, event: PlantEvent) {
        let mut event = event;
        loop {
            match self.tx.try_send(event) {
                Ok(()) => return,
                Err(xch::TrySendError::Full(back)) => {
                    if self.rx.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    event = back;
                }
                // We hold a receiver ourselves, so this only happens mid-teardown.
                Err(xch::TrySendError::Disconnected(_)) => return,
            }
        }
    }

    /// Receiver for the consumer. Receivers share one queue; each event is
    /// delivered to exactly one of them.
    pub fn receiver(&self) -> xch::Receiver<PlantEvent> {
        self.rx.clone()
    }

    /// Events discarded because the consumer lagged.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}
