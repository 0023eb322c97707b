//! One station: six tanks, each with its own poller, valve writer and command.
//!
//! A tank whose remote cannot be resolved is marked failed and left without
//! a poller; the rest of the station keeps running.
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use mixplant_traits::{RemoteBackend, RemoteCommand, SharedClock};

use crate::alarm::DualThresholdAlarm;
use crate::alarm_log::AlarmLog;
use crate::bus::EventBus;
use crate::comm_error::map_remote_error;
use crate::config::PlantCfg;
use crate::debounce::CommandDebouncer;
use crate::error::{PlantError, RemoteOp};
use crate::plant_state::{PlantState, TankWriter};
use crate::poller::{PollSink, PollingWorker, TankChannels, VALVE};
use crate::types::{StationId, TankKey, TankName, TankRole};

pub const FILL: &str = "Fill";
pub const FLUSH: &str = "Flush";

/// Plant-wide pieces every station publishes into.
#[derive(Clone)]
pub struct StationContext {
    pub state: Arc<PlantState>,
    pub alarms: Arc<AlarmLog>,
    pub bus: EventBus,
    pub clock: SharedClock,
}

struct TankControl {
    device: String,
    worker: Option<PollingWorker>,
    valve: Option<CommandDebouncer>,
    command: Option<Mutex<Box<dyn RemoteCommand>>>,
}

pub struct StationCoordinator {
    id: StationId,
    tanks: BTreeMap<TankName, TankControl>,
    state: Arc<PlantState>,
}

fn command_for(role: TankRole) -> &'static str {
    match role {
        TankRole::Supply => FILL,
        TankRole::Mixer => FLUSH,
    }
}

impl StationCoordinator {
    /// Resolve and start all six tanks of `id`.
    ///
    /// Fails only when a tank's state slot is already claimed; remote
    /// failures are isolated to the affected tank.
    pub fn start(
        id: StationId,
        backend: &dyn RemoteBackend,
        cfg: &PlantCfg,
        ctx: &StationContext,
    ) -> Result<Self, PlantError> {
        let writers = TankName::ALL
            .iter()
            .map(|&tank| ctx.state.register(TankKey::new(id, tank)))
            .collect::<Result<Vec<TankWriter>, _>>()?;

        let mut tanks = BTreeMap::new();
        for writer in writers {
            let key = writer.key();
            let device = key.device_path(&cfg.prefix);
            let control = Self::start_tank(key, device, writer, backend, cfg, ctx);
            tanks.insert(key.tank, control);
        }
        tracing::info!(station = %id, "station started");
        Ok(Self {
            id,
            tanks,
            state: ctx.state.clone(),
        })
    }

    fn start_tank(
        key: TankKey,
        device: String,
        writer: TankWriter,
        backend: &dyn RemoteBackend,
        cfg: &PlantCfg,
        ctx: &StationContext,
    ) -> TankControl {
        let valve = match backend.float_variable(&device, VALVE) {
            Ok(var) => {
                let d = CommandDebouncer::spawn(
                    key,
                    var,
                    format!("{device}/{VALVE}"),
                    cfg.commands.settle,
                );
                if cfg.commands.close_valves_on_start {
                    d.request(0.0);
                }
                Some(d)
            }
            Err(e) => {
                let ce = map_remote_error(RemoteOp::Resolve, &format!("{device}/{VALVE}"), e.as_ref());
                tracing::warn!(tank = %key, error = %ce, "valve control unavailable");
                None
            }
        };

        let worker = match TankChannels::resolve(backend, &device) {
            Ok(channels) => {
                let alarm = DualThresholdAlarm::for_key(key, &cfg.alarms.thresholds);
                let mut sink = PollSink::new(writer, alarm, ctx.alarms.clone(), ctx.bus.clone());
                if let Some(d) = &valve {
                    sink = sink.with_valve_view(d.view());
                }
                Some(PollingWorker::spawn(
                    channels,
                    sink,
                    cfg.polling.interval,
                    ctx.clock.clone(),
                ))
            }
            Err(e) => {
                tracing::error!(tank = %key, error = %e, "tank unavailable");
                writer.mark_failed();
                None
            }
        };

        let name = command_for(key.tank.role());
        let command = match backend.command(&device, name) {
            Ok(cmd) => Some(Mutex::new(cmd)),
            Err(e) => {
                let ce = map_remote_error(RemoteOp::Resolve, &format!("{device}/{name}"), e.as_ref());
                tracing::warn!(tank = %key, error = %ce, "command unavailable");
                None
            }
        };

        TankControl {
            device,
            worker,
            valve,
            command,
        }
    }

    pub fn id(&self) -> StationId {
        self.id
    }

    fn tank(&self, tank: TankName) -> Result<&TankControl, PlantError> {
        self.tanks
            .get(&tank)
            .ok_or_else(|| PlantError::UnknownTank(tank.to_string()))
    }

    /// Queue a valve ratio for `tank`; the write goes out after the settle period.
    pub fn request_valve(&self, tank: TankName, ratio: f64) -> Result<(), PlantError> {
        let key = TankKey::new(self.id, tank);
        let valve = self
            .tank(tank)?
            .valve
            .as_ref()
            .ok_or(PlantError::TankUnavailable(key))?;
        valve.request(ratio);
        Ok(())
    }

    /// Valve position to show: a pending request wins over the polled value.
    pub fn displayed_valve(&self, tank: TankName) -> Option<f64> {
        let key = TankKey::new(self.id, tank);
        let polled = self.state.get(&key).map(|s| s.valve_ratio);
        let control = self.tanks.get(&tank)?;
        match (&control.valve, polled) {
            (Some(v), Some(p)) => Some(v.displayed_valve(p)),
            (Some(v), None) if v.is_pending() => v.desired(),
            (_, p) => p,
        }
    }

    pub fn valve_pending(&self, tank: TankName) -> bool {
        self.tanks
            .get(&tank)
            .and_then(|c| c.valve.as_ref())
            .is_some_and(CommandDebouncer::is_pending)
    }

    /// Top a supply tank up. Returns the level reported by the remote.
    pub fn fill(&self, tank: TankName) -> Result<f64, PlantError> {
        self.invoke(tank, TankRole::Supply)
    }

    /// Empty the mixer. Returns the level reported by the remote.
    pub fn flush(&self, tank: TankName) -> Result<f64, PlantError> {
        self.invoke(tank, TankRole::Mixer)
    }

    fn invoke(&self, tank: TankName, role: TankRole) -> Result<f64, PlantError> {
        let key = TankKey::new(self.id, tank);
        let name = command_for(role);
        if tank.role() != role {
            return Err(PlantError::UnsupportedCommand { command: name, key });
        }
        let control = self.tank(tank)?;
        let command = control
            .command
            .as_ref()
            .ok_or(PlantError::TankUnavailable(key))?;
        let target = format!("{}/{name}", control.device);
        let mut cmd = command.lock().unwrap_or_else(PoisonError::into_inner);
        match cmd.invoke(&[]) {
            Ok(level) => {
                tracing::info!(tank = %key, command = name, level, "command invoked");
                Ok(level)
            }
            Err(e) => {
                let ce = map_remote_error(RemoteOp::Invoke, &target, e.as_ref());
                tracing::warn!(tank = %key, error = %ce, "command failed");
                Err(ce.into())
            }
        }
    }

    /// Whether `tank` has a running poller.
    pub fn is_polling(&self, tank: TankName) -> bool {
        self.tanks
            .get(&tank)
            .and_then(|c| c.worker.as_ref())
            .is_some_and(PollingWorker::is_running)
    }

    /// (published, discarded) poll rounds for `tank`.
    pub fn poll_counts(&self, tank: TankName) -> Option<(u64, u64)> {
        let worker = self.tanks.get(&tank)?.worker.as_ref()?;
        Some((worker.rounds_ok(), worker.rounds_failed()))
    }

    /// Signal every worker of this station without waiting.
    pub fn signal_stop(&mut self) {
        for control in self.tanks.values_mut() {
            if let Some(w) = control.worker.as_mut() {
                w.signal_stop();
            }
            if let Some(v) = control.valve.as_mut() {
                v.signal_stop();
            }
        }
    }

    pub fn join(&mut self) {
        for control in self.tanks.values_mut() {
            if let Some(w) = control.worker.as_mut() {
                w.join();
            }
            if let Some(v) = control.valve.as_mut() {
                v.join();
            }
        }
        tracing::debug!(station = %self.id, "station stopped");
    }

    pub fn stop(&mut self) {
        self.signal_stop();
        self.join();
    }
}

impl Drop for StationCoordinator {
    fn drop(&mut self) {
        self.stop();
    }
}
