//! Background polling of one tank.
//!
//! Spawns a thread that owns the tank's four remote variables, reads them in
//! a fixed order every round, and publishes the round as one snapshot. A
//! round with any failed read is discarded whole.
//!
//! Each `PollingWorker` owns exactly one thread, which is shut down and
//! joined when the worker is stopped or dropped.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use mixplant_traits::{Clock, RemoteBackend, RemoteVariable};

use crate::alarm::DualThresholdAlarm;
use crate::alarm_log::AlarmLog;
use crate::bus::{EventBus, PlantEvent};
use crate::comm_error::map_remote_error;
use crate::debounce::ValveView;
use crate::error::{CommunicationError, FailureKind, RemoteOp};
use crate::plant_state::TankWriter;
use crate::types::{Rgb, TankKey, TankState};

pub const LEVEL: &str = "level";
pub const FLOW: &str = "flow";
pub const VALVE: &str = "valve";
pub const COLOR: &str = "color";

/// The four remote variables of one tank.
pub struct TankChannels {
    device: String,
    level: Box<dyn RemoteVariable<f64>>,
    flow: Box<dyn RemoteVariable<f64>>,
    valve: Box<dyn RemoteVariable<f64>>,
    color: Box<dyn RemoteVariable<String>>,
}

impl TankChannels {
    pub fn new(
        device: impl Into<String>,
        level: Box<dyn RemoteVariable<f64>>,
        flow: Box<dyn RemoteVariable<f64>>,
        valve: Box<dyn RemoteVariable<f64>>,
        color: Box<dyn RemoteVariable<String>>,
    ) -> Self {
        Self {
            device: device.into(),
            level,
            flow,
            valve,
            color,
        }
    }

    /// Resolve all four variables of `device`; the first failure wins.
    pub fn resolve(backend: &dyn RemoteBackend, device: &str) -> Result<Self, CommunicationError> {
        let float = |name: &str| {
            backend.float_variable(device, name).map_err(|e| {
                map_remote_error(RemoteOp::Resolve, &format!("{device}/{name}"), e.as_ref())
            })
        };
        let level = float(LEVEL)?;
        let flow = float(FLOW)?;
        let valve = float(VALVE)?;
        let color = backend.text_variable(device, COLOR).map_err(|e| {
            map_remote_error(RemoteOp::Resolve, &format!("{device}/{COLOR}"), e.as_ref())
        })?;
        Ok(Self::new(device, level, flow, valve, color))
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// One round: level, flow, valve ratio, colour, in that order.
    pub fn read_round(&mut self) -> Result<TankState, CommunicationError> {
        let level = read_number(&mut *self.level, &self.device, LEVEL)?;
        let flow = read_number(&mut *self.flow, &self.device, FLOW)?;
        let valve_ratio = read_number(&mut *self.valve, &self.device, VALVE)?;
        let target = format!("{}/{COLOR}", self.device);
        let raw = self
            .color
            .read()
            .map_err(|e| map_remote_error(RemoteOp::Read, &target, e.as_ref()))?;
        let color: Rgb = raw
            .parse()
            .map_err(|detail: String| {
                CommunicationError::new(RemoteOp::Read, target, FailureKind::Malformed, detail)
            })?;
        Ok(TankState {
            level,
            flow,
            valve_ratio,
            color,
        })
    }
}

fn read_number(
    var: &mut dyn RemoteVariable<f64>,
    device: &str,
    name: &str,
) -> Result<f64, CommunicationError> {
    let target = || format!("{device}/{name}");
    let v = var
        .read()
        .map_err(|e| map_remote_error(RemoteOp::Read, &target(), e.as_ref()))?;
    if !v.is_finite() {
        return Err(CommunicationError::new(
            RemoteOp::Read,
            target(),
            FailureKind::Malformed,
            format!("non-finite value {v}"),
        ));
    }
    Ok(v)
}

/// Where a successful round goes: the state store, the tank's detector, the
/// shared alarm log and the event bus.
pub struct PollSink {
    writer: TankWriter,
    alarm: DualThresholdAlarm,
    log: Arc<AlarmLog>,
    bus: EventBus,
    valve: Option<ValveView>,
}

impl PollSink {
    pub fn new(writer: TankWriter, alarm: DualThresholdAlarm, log: Arc<AlarmLog>, bus: EventBus) -> Self {
        Self {
            writer,
            alarm,
            log,
            bus,
            valve: None,
        }
    }

    /// Report the pending valve request in snapshots instead of the polled echo.
    pub fn with_valve_view(mut self, view: ValveView) -> Self {
        self.valve = Some(view);
        self
    }

    fn apply(&mut self, state: TankState, at: Instant) {
        let key = self.writer.key();
        self.writer.publish(state, at);
        let fired = self.alarm.evaluate(state.level);
        let displayed_valve = self
            .valve
            .as_ref()
            .map_or(state.valve_ratio, |v| v.displayed(state.valve_ratio));
        self.bus.publish(PlantEvent::Snapshot {
            key,
            state,
            displayed_valve,
        });
        for record in fired {
            tracing::info!(tank = %record.key, message = %record.message, "alarm");
            self.log.append(record.clone());
            self.bus.publish(PlantEvent::Alarm(record));
        }
    }
}

pub struct PollingWorker {
    key: TankKey,
    /// Dropping the sender is the stop signal.
    stop_tx: Option<xch::Sender<()>>,
    rounds_ok: Arc<AtomicU64>,
    rounds_failed: Arc<AtomicU64>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl PollingWorker {
    pub fn spawn<C: Clock + Send + 'static>(
        mut channels: TankChannels,
        mut sink: PollSink,
        interval: Duration,
        clock: C,
    ) -> Self {
        let key = sink.writer.key();
        let (stop_tx, stop_rx) = xch::bounded::<()>(0);
        let rounds_ok = Arc::new(AtomicU64::new(0));
        let rounds_failed = Arc::new(AtomicU64::new(0));
        let ok_clone = rounds_ok.clone();
        let failed_clone = rounds_failed.clone();

        let join_handle = std::thread::spawn(move || {
            tracing::debug!(tank = %key, device = channels.device(), "polling worker started");
            loop {
                // Stop check at the top of every round
                if !matches!(stop_rx.try_recv(), Err(xch::TryRecvError::Empty)) {
                    break;
                }

                match channels.read_round() {
                    Ok(state) => {
                        sink.apply(state, clock.now());
                        ok_clone.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        failed_clone.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(tank = %key, error = %e, "poll round discarded");
                    }
                }

                // Fixed delay after the round; a stop signal cuts it short
                match stop_rx.recv_timeout(interval) {
                    Err(xch::RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
            }
            tracing::trace!(tank = %key, "polling worker exiting cleanly");
        });

        Self {
            key,
            stop_tx: Some(stop_tx),
            rounds_ok,
            rounds_failed,
            join_handle: Some(join_handle),
        }
    }

    pub fn key(&self) -> TankKey {
        self.key
    }

    /// Rounds published so far.
    pub fn rounds_ok(&self) -> u64 {
        self.rounds_ok.load(Ordering::Relaxed)
    }

    /// Rounds discarded because a read failed.
    pub fn rounds_failed(&self) -> u64 {
        self.rounds_failed.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.join_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Ask the thread to stop without waiting for it.
    pub fn signal_stop(&mut self) {
        self.stop_tx.take();
    }

    /// Wait for the thread after `signal_stop`. A read in flight completes first.
    pub fn join(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!(tank = %self.key, "polling worker joined"),
                Err(e) => tracing::warn!(tank = %self.key, ?e, "polling worker panicked"),
            }
        }
    }

    pub fn stop(&mut self) {
        self.signal_stop();
        self.join();
    }
}

impl Drop for PollingWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
