//! The whole plant: every configured station plus the shared state store,
//! alarm log and event bus.
use std::sync::Arc;

use crossbeam_channel as xch;
use eyre::WrapErr;
use mixplant_traits::{Clock, RemoteBackend, SharedClock};

use crate::alarm_log::AlarmLog;
use crate::bus::{EventBus, PlantEvent};
use crate::config::PlantCfg;
use crate::error::{PlantError, Result};
use crate::plant_state::PlantState;
use crate::station::{StationContext, StationCoordinator};
use crate::types::{StationId, TankHealth, TankKey, TankName};

pub struct Plant {
    cfg: PlantCfg,
    stations: Vec<StationCoordinator>,
    ctx: StationContext,
}

impl Plant {
    /// Start polling every tank of stations `1..=cfg.stations`.
    pub fn start(cfg: PlantCfg, backend: &dyn RemoteBackend, clock: SharedClock) -> Result<Self> {
        if cfg.stations == 0 || cfg.stations > StationId::MAX {
            return Err(PlantError::Config(format!(
                "stations must be in 1..={}, got {}",
                StationId::MAX,
                cfg.stations
            ))
            .into());
        }
        if cfg.prefix.is_empty() {
            return Err(PlantError::Config("device prefix must not be empty".into()).into());
        }

        let ctx = StationContext {
            state: Arc::new(PlantState::new()),
            alarms: Arc::new(AlarmLog::new(cfg.alarms.log_capacity)),
            bus: EventBus::new(cfg.event_capacity),
            clock,
        };

        let mut stations = Vec::with_capacity(usize::from(cfg.stations));
        for id in StationId::first(cfg.stations) {
            let station = StationCoordinator::start(id, backend, &cfg, &ctx)
                .wrap_err_with(|| format!("start {id}"))?;
            stations.push(station);
        }
        tracing::info!(
            stations = cfg.stations,
            prefix = %cfg.prefix,
            interval = ?cfg.polling.interval,
            "plant started"
        );
        Ok(Self { cfg, stations, ctx })
    }

    pub fn config(&self) -> &PlantCfg {
        &self.cfg
    }

    pub fn stations(&self) -> &[StationCoordinator] {
        &self.stations
    }

    pub fn station(&self, id: StationId) -> Option<&StationCoordinator> {
        self.stations.iter().find(|s| s.id() == id)
    }

    fn station_for(&self, key: TankKey) -> std::result::Result<&StationCoordinator, PlantError> {
        self.station(key.station)
            .ok_or(PlantError::UnknownStation(key.station.get()))
    }

    pub fn state(&self) -> &Arc<PlantState> {
        &self.ctx.state
    }

    pub fn alarms(&self) -> &Arc<AlarmLog> {
        &self.ctx.alarms
    }

    /// A receiver on the event bus. Receivers share one queue.
    pub fn events(&self) -> xch::Receiver<PlantEvent> {
        self.ctx.bus.receiver()
    }

    /// Events discarded because the bus was full.
    pub fn dropped_events(&self) -> u64 {
        self.ctx.bus.dropped()
    }

    pub fn health(&self, key: &TankKey) -> Option<TankHealth> {
        self.ctx
            .state
            .health(key, self.ctx.clock.now(), self.cfg.stale_after)
    }

    pub fn request_valve(&self, key: TankKey, ratio: f64) -> std::result::Result<(), PlantError> {
        self.station_for(key)?.request_valve(key.tank, ratio)
    }

    pub fn displayed_valve(&self, key: TankKey) -> Option<f64> {
        self.station(key.station)?.displayed_valve(key.tank)
    }

    pub fn fill(&self, key: TankKey) -> std::result::Result<f64, PlantError> {
        self.station_for(key)?.fill(key.tank)
    }

    pub fn flush(&self, key: TankKey) -> std::result::Result<f64, PlantError> {
        self.station_for(key)?.flush(key.tank)
    }

    /// Every configured tank key, station-major.
    pub fn keys(&self) -> Vec<TankKey> {
        self.stations
            .iter()
            .flat_map(|s| TankName::ALL.iter().map(move |&t| TankKey::new(s.id(), t)))
            .collect()
    }

    /// Signal every worker, then wait for all of them.
    pub fn stop(&mut self) {
        for s in &mut self.stations {
            s.signal_stop();
        }
        for s in &mut self.stations {
            s.join();
        }
    }
}

impl Drop for Plant {
    fn drop(&mut self) {
        self.stop();
    }
}
