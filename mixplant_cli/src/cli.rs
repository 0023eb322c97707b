//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use mixplant_core::types::TankKey;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "mixplant", version, about = "Paint mixing plant monitor")]
pub struct Cli {
    /// Path to config TOML; a missing file means built-in defaults
    #[arg(long, value_name = "FILE", default_value = "etc/mixplant.toml")]
    pub config: PathBuf,

    /// Print results and logs as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); RUST_LOG wins when set
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Parse `S/T=R`, e.g. `1/cyan=0.5` or `station2/mixer=1`.
pub fn parse_valve(s: &str) -> Result<(TankKey, f64), String> {
    let (key, ratio) = s
        .split_once('=')
        .ok_or_else(|| format!("expected STATION/TANK=RATIO, got `{s}`"))?;
    let key: TankKey = key.parse().map_err(|e| format!("{e}"))?;
    let ratio: f64 = ratio
        .parse()
        .map_err(|_| format!("ratio must be a number, got `{ratio}`"))?;
    if !(0.0..=1.0).contains(&ratio) {
        return Err(format!("ratio must be in [0.0, 1.0], got {ratio}"));
    }
    Ok((key, ratio))
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll every configured tank and print alarms as they fire
    Monitor {
        /// Stop after this many seconds (default: run until Ctrl-C)
        #[arg(long, value_name = "N")]
        seconds: Option<u64>,
        /// Request a valve ratio at start, e.g. --valve 1/cyan=0.5 (repeatable)
        #[arg(long, value_name = "S/T=R", value_parser = parse_valve)]
        valve: Vec<(TankKey, f64)>,
        /// Invoke Fill on a supply tank at start (repeatable)
        #[arg(long, value_name = "S/T")]
        fill: Vec<TankKey>,
        /// Invoke Flush on a mixer at start (repeatable)
        #[arg(long, value_name = "S/T")]
        flush: Vec<TankKey>,
    },
    /// Resolve and poll every tank once; fail if any tank is unavailable
    SelfCheck,
    /// Run canned level sequences through the alarm detectors
    AlarmsDemo,
}
