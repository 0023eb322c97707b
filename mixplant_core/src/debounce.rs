//! Debounced valve writes.
//!
//! Every request restarts a settle timer; only the newest value is written
//! once no new request has arrived for the settle period. Until then the
//! requested value is the one shown as the tank's valve position.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel as xch;
use mixplant_traits::RemoteVariable;

use crate::comm_error::map_remote_error;
use crate::error::RemoteOp;
use crate::types::TankKey;

#[derive(Debug, Default)]
struct Shared {
    /// Sequence number of the newest request.
    requested: AtomicU64,
    /// Sequence number of the newest request that was written or superseded.
    settled: AtomicU64,
    desired: Mutex<Option<f64>>,
    acknowledged: Mutex<Option<f64>>,
    writes: AtomicU64,
}

impl Shared {
    fn set_acknowledged(&self, v: f64) {
        *self
            .acknowledged
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(v);
    }

    fn desired(&self) -> Option<f64> {
        *self.desired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_pending(&self) -> bool {
        self.requested.load(Ordering::Acquire) != self.settled.load(Ordering::Acquire)
    }
}

/// Read-only handle on a debouncer's request state.
#[derive(Debug, Clone)]
pub struct ValveView {
    shared: Arc<Shared>,
}

impl ValveView {
    /// True while a request has not been written yet.
    pub fn is_pending(&self) -> bool {
        self.shared.is_pending()
    }

    /// The newest requested ratio, if any request was made.
    pub fn desired(&self) -> Option<f64> {
        self.shared.desired()
    }

    /// The value to show for the valve: the requested one while pending,
    /// otherwise the polled one.
    pub fn displayed(&self, polled: f64) -> f64 {
        match self.shared.desired() {
            Some(v) if self.shared.is_pending() => v,
            _ => polled,
        }
    }
}

pub struct CommandDebouncer {
    key: TankKey,
    tx: Option<xch::Sender<(u64, f64)>>,
    shared: Arc<Shared>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl CommandDebouncer {
    pub fn spawn(
        key: TankKey,
        mut valve: Box<dyn RemoteVariable<f64>>,
        target: String,
        settle: Duration,
    ) -> Self {
        let (tx, rx) = xch::unbounded::<(u64, f64)>();
        let shared = Arc::new(Shared::default());
        let sh = shared.clone();

        let join_handle = std::thread::spawn(move || {
            let mut pending: Option<(u64, f64)> = None;
            loop {
                let next = if pending.is_some() {
                    match rx.recv_timeout(settle) {
                        Ok(m) => Some(m),
                        Err(xch::RecvTimeoutError::Timeout) => None,
                        Err(xch::RecvTimeoutError::Disconnected) => break,
                    }
                } else {
                    match rx.recv() {
                        Ok(m) => Some(m),
                        Err(_) => break,
                    }
                };

                match next {
                    // New request: replace the pending value and restart the timer
                    Some(m) => pending = Some(m),
                    None => {
                        if let Some((seq, value)) = pending.take() {
                            sh.writes.fetch_add(1, Ordering::Relaxed);
                            match valve.write(value) {
                                Ok(ack) => {
                                    tracing::debug!(tank = %key, value, ack, "valve write");
                                    sh.set_acknowledged(ack);
                                }
                                Err(e) => {
                                    let ce = map_remote_error(RemoteOp::Write, &target, e.as_ref());
                                    tracing::warn!(tank = %key, error = %ce, "valve write dropped");
                                }
                            }
                            sh.settled.store(seq, Ordering::Release);
                        }
                    }
                }
            }
            if let Some((_, value)) = pending {
                tracing::debug!(tank = %key, value, "pending valve write cancelled");
            }
            sh.settled
                .store(sh.requested.load(Ordering::Acquire), Ordering::Release);
        });

        Self {
            key,
            tx: Some(tx),
            shared,
            join_handle: Some(join_handle),
        }
    }

    pub fn key(&self) -> TankKey {
        self.key
    }

    /// Submit a new valve ratio. Values are clamped to 0.0..=1.0; NaN is ignored.
    pub fn request(&self, ratio: f64) {
        if ratio.is_nan() {
            tracing::warn!(tank = %self.key, "ignoring NaN valve request");
            return;
        }
        let Some(tx) = &self.tx else {
            tracing::warn!(tank = %self.key, "valve request after shutdown");
            return;
        };
        let value = ratio.clamp(0.0, 1.0);
        // Held across the send: channel order matches desired order
        let mut desired = self
            .shared
            .desired
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *desired = Some(value);
        let seq = self.shared.requested.fetch_add(1, Ordering::AcqRel) + 1;
        if tx.send((seq, value)).is_err() {
            tracing::warn!(tank = %self.key, "valve writer gone; request dropped");
        }
    }

    pub fn view(&self) -> ValveView {
        ValveView {
            shared: self.shared.clone(),
        }
    }

    /// True while a request has not been written yet.
    pub fn is_pending(&self) -> bool {
        self.shared.is_pending()
    }

    /// The newest requested ratio, if any request was made.
    pub fn desired(&self) -> Option<f64> {
        self.shared.desired()
    }

    /// The value to show for the valve: the requested one while pending,
    /// otherwise the polled one.
    pub fn displayed_valve(&self, polled: f64) -> f64 {
        self.view().displayed(polled)
    }

    /// Value the remote acknowledged for the latest completed write.
    pub fn last_acknowledged(&self) -> Option<f64> {
        *self
            .shared
            .acknowledged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes attempted so far.
    pub fn writes_issued(&self) -> u64 {
        self.shared.writes.load(Ordering::Relaxed)
    }

    /// Stop accepting requests. A write still waiting for its settle period is cancelled.
    pub fn signal_stop(&mut self) {
        self.tx.take();
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            if let Err(e) = handle.join() {
                tracing::warn!(tank = %self.key, ?e, "valve writer panicked");
            }
        }
    }

    pub fn stop(&mut self) {
        self.signal_stop();
        self.join();
    }
}

impl Drop for CommandDebouncer {
    fn drop(&mut self) {
        self.stop();
    }
}
