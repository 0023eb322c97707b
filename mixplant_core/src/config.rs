//! Runtime configuration for the monitoring engine.
//!
//! These are the structs the engine consumes. They are separate from the
//! TOML-deserialized config in `mixplant_config`; see `conversions`.

use std::time::Duration;

use crate::alarm::AlarmThresholds;

/// Per-tank polling cadence.
#[derive(Debug, Clone)]
pub struct PollingCfg {
    /// Fixed delay after each round; time spent reading is not compensated.
    pub interval: Duration,
}

impl Default for PollingCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
        }
    }
}

/// Valve command submission.
#[derive(Debug, Clone)]
pub struct CommandCfg {
    /// Quiet period after the last request before the write goes out.
    pub settle: Duration,
    /// Request a closed valve for every tank when a station starts.
    pub close_valves_on_start: bool,
}

impl Default for CommandCfg {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(200),
            close_valves_on_start: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlarmCfg {
    pub log_capacity: usize,
    pub thresholds: AlarmThresholds,
}

impl Default for AlarmCfg {
    fn default() -> Self {
        Self {
            log_capacity: crate::alarm_log::DEFAULT_CAPACITY,
            thresholds: AlarmThresholds::default(),
        }
    }
}

/// Everything needed to start a `Plant`.
#[derive(Debug, Clone)]
pub struct PlantCfg {
    /// Device name prefix, e.g. "epfl".
    pub prefix: String,
    /// Number of stations, 1..=6.
    pub stations: u8,
    pub polling: PollingCfg,
    pub commands: CommandCfg,
    pub alarms: AlarmCfg,
    /// Event queue size toward the presentation side.
    pub event_capacity: usize,
    /// Age after which a tank's data counts as stale.
    pub stale_after: Duration,
}

impl Default for PlantCfg {
    fn default() -> Self {
        Self {
            prefix: "epfl".to_string(),
            stations: 6,
            polling: PollingCfg::default(),
            commands: CommandCfg::default(),
            alarms: AlarmCfg::default(),
            event_capacity: 256,
            stale_after: Duration::from_millis(2000),
        }
    }
}
