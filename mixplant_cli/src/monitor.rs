//! Plant assembly and the monitor / self-check / alarms-demo commands.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use mixplant_core::alarm::{AlarmRecord, DualThresholdAlarm};
use mixplant_core::alarm_log::AlarmLog;
use mixplant_core::bus::PlantEvent;
use mixplant_core::concern::concern;
use mixplant_core::config::PlantCfg;
use mixplant_core::error::PlantError;
use mixplant_core::plant::Plant;
use mixplant_core::types::{StationId, TankHealth, TankKey, TankName};
use mixplant_sim::{SimPlant, SimSettings};
use mixplant_traits::MonotonicClock;
use serde_json::json;

/// Start-up actions requested on the command line.
#[derive(Debug, Default)]
pub struct StartActions {
    pub valves: Vec<(TankKey, f64)>,
    pub fills: Vec<TankKey>,
    pub flushes: Vec<TankKey>,
}

/// Simulated devices matching the configured topology.
pub fn build_backend(cfg: &mixplant_config::Config) -> SimPlant {
    let settings = SimSettings {
        drain_per_read: cfg.simulation.drain_per_read,
        read_latency: Duration::from_millis(cfg.simulation.read_latency_ms),
        ..SimSettings::default()
    };
    SimPlant::with_topology(&cfg.remote.prefix, cfg.topology.stations, settings)
}

fn start_plant(cfg: &mixplant_config::Config, backend: &SimPlant) -> eyre::Result<Plant> {
    let plant_cfg: PlantCfg = cfg.into();
    Plant::start(plant_cfg, backend, MonotonicClock::shared())
}

fn alarm_json(r: &AlarmRecord) -> serde_json::Value {
    json!({
        "type": "alarm",
        "timestamp": r.timestamp.to_rfc3339(),
        "tank": r.key.to_string(),
        "threshold": r.threshold,
        "level": r.level,
        "message": r.message,
    })
}

fn print_alarm(r: &AlarmRecord, json: bool) {
    if json {
        println!("{}", alarm_json(r));
    } else {
        println!("{r}");
    }
}

fn apply_actions(plant: &Plant, actions: &StartActions) -> Result<(), PlantError> {
    for &(key, ratio) in &actions.valves {
        plant.request_valve(key, ratio)?;
        tracing::info!(tank = %key, ratio, "valve requested");
    }
    for &key in &actions.fills {
        let level = plant.fill(key)?;
        println!("{key}: Fill -> {:.0}%", level * 100.0);
    }
    for &key in &actions.flushes {
        let level = plant.flush(key)?;
        println!("{key}: Flush -> {:.0}%", level * 100.0);
    }
    Ok(())
}

fn print_summary(plant: &Plant, json: bool) {
    for key in plant.keys() {
        let health = plant.health(&key).unwrap_or(TankHealth::Stale);
        let state = plant.state().get(&key);
        let thresholds = &plant.config().alarms.thresholds;
        let tint = state.and_then(|s| concern(key.tank.role(), s.level, thresholds));
        if json {
            println!(
                "{}",
                json!({
                    "type": "tank",
                    "tank": key.to_string(),
                    "level": state.map(|s| s.level),
                    "flow": state.map(|s| s.flow),
                    "valve": plant.displayed_valve(key),
                    "color": state.map(|s| s.color.to_string()),
                    "health": health.as_str(),
                    "concern": tint.map(|c| c.to_string()),
                })
            );
        } else {
            let level = state.map_or_else(|| "  --".to_string(), |s| format!("{:3.0}%", s.level * 100.0));
            let valve = plant
                .displayed_valve(key)
                .map_or_else(|| "--".to_string(), |v| format!("{v:.2}"));
            let tint = tint.map(|c| format!("  {c}")).unwrap_or_default();
            println!("{:<18} {level}  valve {valve:>4}  {:<6}{tint}", key.to_string(), health.as_str());
        }
    }
}

/// Poll until `seconds` elapse or Ctrl-C, printing alarms as they fire.
pub fn run_monitor(
    cfg: &mixplant_config::Config,
    seconds: Option<u64>,
    actions: &StartActions,
    json: bool,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    let backend = build_backend(cfg);
    let mut plant = start_plant(cfg, &backend)?;
    apply_actions(&plant, actions)?;

    let rx = plant.events();
    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    let mut alarms = 0usize;
    tracing::info!(seconds, "monitor start");
    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested");
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        if let Ok(event) = rx.recv_timeout(Duration::from_millis(100)) {
            match event {
                PlantEvent::Alarm(record) => {
                    alarms += 1;
                    print_alarm(&record, json);
                }
                PlantEvent::Snapshot {
                    key,
                    state,
                    displayed_valve,
                } => {
                    tracing::trace!(tank = %key, level = state.level, valve = displayed_valve, "snapshot");
                }
            }
        }
    }
    plant.stop();

    print_summary(&plant, json);
    let dropped = plant.dropped_events();
    if json {
        println!(
            "{}",
            json!({ "type": "summary", "alarms": alarms, "dropped_events": dropped })
        );
    } else {
        println!("monitor finished: {alarms} alarms, {dropped} events dropped");
    }
    Ok(())
}

/// Start the plant, wait for one round from every tank, and report.
pub fn run_self_check(cfg: &mixplant_config::Config, json: bool) -> eyre::Result<()> {
    let backend = build_backend(cfg);
    let mut plant = start_plant(cfg, &backend)?;
    let keys = plant.keys();
    let deadline = Instant::now() + Duration::from_secs(3);
    let pending = |plant: &Plant| {
        keys.iter()
            .filter(|k| plant.health(k) == Some(TankHealth::Stale))
            .count()
    };
    while pending(&plant) > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    plant.stop();

    if let Some(&bad) = keys
        .iter()
        .find(|k| plant.health(k) != Some(TankHealth::Fresh))
    {
        return Err(PlantError::TankUnavailable(bad).into());
    }
    if json {
        println!("{}", json!({ "status": "ok", "tanks": keys.len() }));
    } else {
        println!("self-check ok: {} tanks fresh", keys.len());
    }
    Ok(())
}

const DEMO_MIXER: [f64; 6] = [0.70, 0.75, 0.82, 0.85, 0.91, 0.88];
const DEMO_SUPPLY: [f64; 6] = [0.30, 0.25, 0.18, 0.15, 0.09, 0.12];

/// Feed canned sequences through station 1's cyan and mixer detectors.
pub fn run_alarms_demo(cfg: &mixplant_config::Config, json: bool) -> eyre::Result<()> {
    let plant_cfg: PlantCfg = cfg.into();
    let log = AlarmLog::new(plant_cfg.alarms.log_capacity);
    let station = StationId::new(1)?;
    for (tank, levels) in [(TankName::Mixer, DEMO_MIXER), (TankName::Cyan, DEMO_SUPPLY)] {
        let key = TankKey::new(station, tank);
        let mut alarm = DualThresholdAlarm::for_key(key, &plant_cfg.alarms.thresholds);
        for level in levels {
            for record in alarm.evaluate(level) {
                log.append(record);
            }
        }
    }
    for record in log.snapshot() {
        print_alarm(&record, json);
    }
    Ok(())
}
