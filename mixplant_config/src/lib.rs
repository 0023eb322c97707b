#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the mixing-plant monitor.
//!
//! `Config` and its sections are deserialized from TOML and validated. Every
//! section is optional; an empty document yields the stock plant (six
//! stations, 500 ms polling, 200 ms valve settle, ten alarm slots).
use serde::Deserialize;
use std::path::Path;

/// Number of stations the plant topology provides.
pub const MAX_STATIONS: u8 = 6;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Remote {
    /// Device name prefix, e.g. "epfl" for `epfl/station1/cyan`.
    pub prefix: String,
}

impl Default for Remote {
    fn default() -> Self {
        Self {
            prefix: "epfl".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Topology {
    /// Stations to monitor, numbered 1..=stations.
    pub stations: u8,
}

impl Default for Topology {
    fn default() -> Self {
        Self {
            stations: MAX_STATIONS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Polling {
    /// Fixed delay between the end of one round and the start of the next.
    pub interval_ms: u64,
}

impl Default for Polling {
    fn default() -> Self {
        Self { interval_ms: 500 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Commands {
    /// Quiet period before a debounced valve write is issued
    pub settle_ms: u64,
    /// Request a closed valve for every tank when a station starts
    pub close_valves_on_start: bool,
}

impl Default for Commands {
    fn default() -> Self {
        Self {
            settle_ms: 200,
            close_valves_on_start: true,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Alarms {
    pub log_capacity: usize,
    /// Ascending thresholds for the mixer ("% full").
    pub mixer_thresholds: Vec<f64>,
    /// Descending thresholds for supply tanks ("% remaining").
    pub supply_thresholds: Vec<f64>,
}

impl Default for Alarms {
    fn default() -> Self {
        Self {
            log_capacity: 10,
            mixer_thresholds: vec![0.8, 0.9],
            supply_thresholds: vec![0.2, 0.1],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Events {
    /// Bounded queue size toward the presentation side; oldest events are dropped beyond it.
    pub capacity: usize,
}

impl Default for Events {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Health {
    /// A tank with no successful round for this long is reported stale.
    pub stale_after_ms: u64,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            stale_after_ms: 2000,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Simulation {
    /// Level drift per read at a fully open valve (0 disables drift).
    pub drain_per_read: f64,
    /// Artificial latency for every simulated read.
    pub read_latency_ms: u64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub remote: Remote,
    pub topology: Topology,
    pub polling: Polling,
    pub commands: Commands,
    pub alarms: Alarms,
    pub events: Events,
    pub health: Health,
    pub logging: Logging,
    pub simulation: Simulation,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file. A missing file yields the defaults.
pub fn load_path(path: &Path) -> eyre::Result<Config> {
    if !path.exists() {
        let cfg = Config::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {}: {}", path.display(), e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn check_ratio_list(name: &str, values: &[f64], ascending: bool) -> eyre::Result<()> {
    if values.is_empty() {
        eyre::bail!("alarms.{name} must list at least one threshold");
    }
    if values.iter().any(|t| !(0.0..=1.0).contains(t)) {
        eyre::bail!("alarms.{name} values must be in [0.0, 1.0]");
    }
    let ordered = values.windows(2).all(|w| {
        if ascending { w[0] < w[1] } else { w[0] > w[1] }
    });
    if !ordered {
        let dir = if ascending { "ascending" } else { "descending" };
        eyre::bail!("alarms.{name} must be strictly {dir}");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Remote
        if self.remote.prefix.trim().is_empty() {
            eyre::bail!("remote.prefix must not be empty");
        }
        if self.remote.prefix.contains(char::is_whitespace) {
            eyre::bail!("remote.prefix must not contain whitespace");
        }

        // Topology
        if self.topology.stations == 0 || self.topology.stations > MAX_STATIONS {
            eyre::bail!("topology.stations must be in 1..={MAX_STATIONS}");
        }

        // Polling
        if self.polling.interval_ms == 0 {
            eyre::bail!("polling.interval_ms must be >= 1");
        }
        if self.polling.interval_ms > 60 * 60 * 1000 {
            eyre::bail!("polling.interval_ms is unreasonably large (>1h)");
        }

        // Commands
        if self.commands.settle_ms == 0 {
            eyre::bail!("commands.settle_ms must be >= 1");
        }
        if self.commands.settle_ms > 60 * 1000 {
            eyre::bail!("commands.settle_ms is unreasonably large (>1min)");
        }

        // Alarms
        if self.alarms.log_capacity == 0 {
            eyre::bail!("alarms.log_capacity must be >= 1");
        }
        check_ratio_list("mixer_thresholds", &self.alarms.mixer_thresholds, true)?;
        check_ratio_list("supply_thresholds", &self.alarms.supply_thresholds, false)?;

        // Events
        if self.events.capacity == 0 {
            eyre::bail!("events.capacity must be >= 1");
        }

        // Health
        if self.health.stale_after_ms < self.polling.interval_ms {
            eyre::bail!("health.stale_after_ms must be >= polling.interval_ms");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Simulation
        if !(0.0..=1.0).contains(&self.simulation.drain_per_read) {
            eyre::bail!("simulation.drain_per_read must be in [0.0, 1.0]");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_the_stock_plant() {
        let cfg = load_toml("").expect("parse");
        cfg.validate().expect("defaults validate");
        assert_eq!(cfg.remote.prefix, "epfl");
        assert_eq!(cfg.topology.stations, 6);
        assert_eq!(cfg.polling.interval_ms, 500);
        assert_eq!(cfg.commands.settle_ms, 200);
        assert_eq!(cfg.alarms.log_capacity, 10);
        assert_eq!(cfg.alarms.mixer_thresholds, vec![0.8, 0.9]);
        assert_eq!(cfg.alarms.supply_thresholds, vec![0.2, 0.1]);
    }

    #[test]
    fn ratio_list_order_is_enforced() {
        assert!(check_ratio_list("x", &[0.8, 0.9], true).is_ok());
        assert!(check_ratio_list("x", &[0.9, 0.8], true).is_err());
        assert!(check_ratio_list("x", &[0.2, 0.1], false).is_ok());
        assert!(check_ratio_list("x", &[0.2, 0.2], false).is_err());
        assert!(check_ratio_list("x", &[], false).is_err());
    }
}
