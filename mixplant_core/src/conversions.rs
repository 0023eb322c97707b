//! `From` implementations bridging `mixplant_config` types to engine types.

use std::time::Duration;

use crate::alarm::{AlarmThresholds, ThresholdSet};
use crate::config::{AlarmCfg, CommandCfg, PlantCfg, PollingCfg};

// ── PollingCfg ───────────────────────────────────────────────────────────────

impl From<&mixplant_config::Polling> for PollingCfg {
    fn from(c: &mixplant_config::Polling) -> Self {
        Self {
            interval: Duration::from_millis(c.interval_ms),
        }
    }
}

// ── CommandCfg ───────────────────────────────────────────────────────────────

impl From<&mixplant_config::Commands> for CommandCfg {
    fn from(c: &mixplant_config::Commands) -> Self {
        Self {
            settle: Duration::from_millis(c.settle_ms),
            close_valves_on_start: c.close_valves_on_start,
        }
    }
}

// ── AlarmCfg ─────────────────────────────────────────────────────────────────

impl From<&mixplant_config::Alarms> for AlarmCfg {
    fn from(c: &mixplant_config::Alarms) -> Self {
        Self {
            log_capacity: c.log_capacity,
            thresholds: AlarmThresholds {
                mixer: ThresholdSet::ascending(c.mixer_thresholds.clone()),
                supply: ThresholdSet::descending(c.supply_thresholds.clone()),
            },
        }
    }
}

// ── PlantCfg ─────────────────────────────────────────────────────────────────

impl From<&mixplant_config::Config> for PlantCfg {
    fn from(c: &mixplant_config::Config) -> Self {
        Self {
            prefix: c.remote.prefix.clone(),
            stations: c.topology.stations,
            polling: (&c.polling).into(),
            commands: (&c.commands).into(),
            alarms: (&c.alarms).into(),
            event_capacity: c.events.capacity,
            stale_after: Duration::from_millis(c.health.stale_after_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_documents_map_to_default_runtime_config() {
        let file = mixplant_config::Config::default();
        let cfg: PlantCfg = (&file).into();
        let stock = PlantCfg::default();
        assert_eq!(cfg.prefix, stock.prefix);
        assert_eq!(cfg.stations, stock.stations);
        assert_eq!(cfg.polling.interval, stock.polling.interval);
        assert_eq!(cfg.commands.settle, stock.commands.settle);
        assert_eq!(cfg.alarms.thresholds, stock.alarms.thresholds);
        assert_eq!(cfg.alarms.log_capacity, stock.alarms.log_capacity);
        assert_eq!(cfg.event_capacity, stock.event_capacity);
        assert_eq!(cfg.stale_after, stock.stale_after);
    }
}
