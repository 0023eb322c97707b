//! Test and helper mocks for mixplant_core

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use mixplant_traits::{RemoteError, RemoteVariable};

#[derive(Debug)]
struct MemoryInner<T> {
    value: Mutex<T>,
    writes: Mutex<Vec<T>>,
    failing: AtomicBool,
    latency_ms: AtomicU64,
}

/// An in-memory remote variable. Clones share the same value, so a test can
/// keep one handle and hand the other to a worker.
#[derive(Debug)]
pub struct MemoryVariable<T> {
    inner: Arc<MemoryInner<T>>,
}

impl<T> Clone for MemoryVariable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> MemoryVariable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                value: Mutex::new(value),
                writes: Mutex::new(Vec::new()),
                failing: AtomicBool::new(false),
                latency_ms: AtomicU64::new(0),
            }),
        }
    }

    /// Change the value without recording a write.
    pub fn set(&self, value: T) {
        *self.inner.value.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }

    pub fn get(&self) -> T {
        self.inner
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every value passed to `write`, oldest first.
    pub fn writes(&self) -> Vec<T> {
        self.inner
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// While set, reads and writes fail.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::Relaxed);
    }

    /// Delay applied to every read.
    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.inner.latency_ms.store(ms, Ordering::Relaxed);
    }

    pub fn boxed(&self) -> Box<dyn RemoteVariable<T>> {
        Box::new(self.clone())
    }

    fn check(&self) -> Result<(), RemoteError> {
        if self.inner.failing.load(Ordering::Relaxed) {
            return Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "memory variable offline",
            )));
        }
        Ok(())
    }
}

impl<T: Clone + Send + 'static> RemoteVariable<T> for MemoryVariable<T> {
    fn read(&mut self) -> Result<T, RemoteError> {
        let ms = self.inner.latency_ms.load(Ordering::Relaxed);
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms));
        }
        self.check()?;
        Ok(self.get())
    }

    fn write(&mut self, value: T) -> Result<T, RemoteError> {
        self.check()?;
        self.inner
            .writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(value.clone());
        self.set(value);
        Ok(self.get())
    }
}

/// A variable whose remote never answers.
pub struct UnreachableVariable;

impl<T> RemoteVariable<T> for UnreachableVariable {
    fn read(&mut self) -> Result<T, RemoteError> {
        Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "unreachable variable",
        )))
    }

    fn write(&mut self, _value: T) -> Result<T, RemoteError> {
        Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "unreachable variable",
        )))
    }
}
