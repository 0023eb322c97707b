//! End-to-end plant behaviour against the simulated devices.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mixplant_core::bus::PlantEvent;
use mixplant_core::config::{CommandCfg, PlantCfg, PollingCfg};
use mixplant_core::error::PlantError;
use mixplant_core::plant::Plant;
use mixplant_core::types::{StationId, TankHealth, TankKey, TankName};
use mixplant_sim::{SimPlant, SimSettings};
use mixplant_traits::clock::MonotonicClock;
use mixplant_traits::clock::test_clock::TestClock;
use mixplant_traits::{RemoteBackend, RemoteVariable, SharedClock};

fn cfg(stations: u8, interval_ms: u64) -> PlantCfg {
    PlantCfg {
        stations,
        polling: PollingCfg {
            interval: Duration::from_millis(interval_ms),
        },
        commands: CommandCfg {
            settle: Duration::from_millis(20),
            close_valves_on_start: true,
        },
        ..PlantCfg::default()
    }
}

fn sim(stations: u8, drain: f64) -> SimPlant {
    SimPlant::with_topology(
        "epfl",
        stations,
        SimSettings {
            drain_per_read: drain,
            ..SimSettings::default()
        },
    )
}

fn key(tank: TankName) -> TankKey {
    TankKey::new(StationId::new(1).unwrap(), tank)
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn draining_supply_raises_remaining_alarms() {
    let backend = sim(1, 0.05);
    let plant = Plant::start(cfg(1, 10), &backend, MonotonicClock::shared()).unwrap();
    let cyan = key(TankName::Cyan);

    plant.request_valve(cyan, 1.0).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        plant.alarms().snapshot().iter().any(|r| r.threshold == 0.1)
    }));

    let log = plant.alarms().snapshot();
    let thresholds: Vec<f64> = log.iter().filter(|r| r.key == cyan).map(|r| r.threshold).collect();
    // Newest first
    assert_eq!(thresholds, vec![0.1, 0.2]);
    assert!(log.iter().all(|r| r.message.ends_with("% remaining")));
    assert!(log[0].to_string().contains(" : station1/cyan : "));
}

#[test]
fn valve_request_is_written_and_polled_back() {
    let backend = sim(1, 0.0);
    let plant = Plant::start(cfg(1, 10), &backend, MonotonicClock::shared()).unwrap();
    let mixer = key(TankName::Mixer);

    plant.request_valve(mixer, 0.4).unwrap();
    assert_eq!(plant.displayed_valve(mixer), Some(0.4));
    assert!(wait_until(Duration::from_secs(2), || {
        backend.valve("epfl/station1/mixer") == Some(0.4)
    }));
    assert!(wait_until(Duration::from_secs(2), || {
        plant.state().get(&mixer).is_some_and(|s| s.valve_ratio == 0.4)
    }));
    assert_eq!(plant.displayed_valve(mixer), Some(0.4));
}

#[test]
fn snapshots_show_requested_valve_while_settling() {
    let backend = sim(1, 0.0);
    let mut c = cfg(1, 10);
    c.commands.settle = Duration::from_millis(500);
    c.commands.close_valves_on_start = false;
    let plant = Plant::start(c, &backend, MonotonicClock::shared()).unwrap();
    let cyan = key(TankName::Cyan);
    let rx = plant.events();

    assert!(wait_until(Duration::from_secs(2), || plant.state().get(&cyan).is_some()));
    rx.try_iter().for_each(drop);
    plant.request_valve(cyan, 0.7).unwrap();

    let mut seen = Vec::new();
    let until = Instant::now() + Duration::from_millis(200);
    while Instant::now() < until {
        if let Ok(PlantEvent::Snapshot {
            key,
            state,
            displayed_valve,
        }) = rx.recv_timeout(Duration::from_millis(20))
            && key == cyan
        {
            seen.push((state.valve_ratio, displayed_valve));
        }
    }
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|&(polled, shown)| polled == 0.0 && shown == 0.7), "{seen:?}");
    assert_eq!(backend.valve("epfl/station1/cyan"), Some(0.0));
}

#[test]
fn unresolvable_tank_is_isolated() {
    let backend = sim(1, 0.0);
    backend.remove_device("epfl/station1/magenta");
    let plant = Plant::start(cfg(1, 10), &backend, MonotonicClock::shared()).unwrap();
    let magenta = key(TankName::Magenta);

    assert_eq!(plant.health(&magenta), Some(TankHealth::Failed));
    let station = plant.station(magenta.station).unwrap();
    assert!(!station.is_polling(TankName::Magenta));
    assert!(matches!(
        plant.request_valve(magenta, 0.5),
        Err(PlantError::TankUnavailable(k)) if k == magenta
    ));

    for tank in TankName::ALL.into_iter().filter(|&t| t != TankName::Magenta) {
        let k = key(tank);
        assert!(
            wait_until(Duration::from_secs(2), || plant.health(&k) == Some(TankHealth::Fresh)),
            "{k} never became fresh"
        );
    }
}

#[test]
fn commands_follow_tank_role() {
    let backend = sim(1, 0.0);
    let plant = Plant::start(cfg(1, 50), &backend, MonotonicClock::shared()).unwrap();
    let cyan = key(TankName::Cyan);
    let mixer = key(TankName::Mixer);

    backend.set_level("epfl/station1/cyan", 0.3);
    assert_eq!(plant.fill(cyan).unwrap(), 1.0);
    assert_eq!(backend.level("epfl/station1/cyan"), Some(1.0));

    backend.set_level("epfl/station1/mixer", 0.7);
    assert_eq!(plant.flush(mixer).unwrap(), 0.0);

    assert!(matches!(
        plant.fill(mixer),
        Err(PlantError::UnsupportedCommand { command: "Fill", .. })
    ));
    assert!(matches!(
        plant.flush(cyan),
        Err(PlantError::UnsupportedCommand { command: "Flush", .. })
    ));
}

#[test]
fn offline_tank_command_reports_communication_error() {
    let backend = sim(1, 0.0);
    let plant = Plant::start(cfg(1, 50), &backend, MonotonicClock::shared()).unwrap();
    backend.set_offline("epfl/station1/white", true);
    let err = plant.fill(key(TankName::White)).unwrap_err();
    assert!(matches!(err, PlantError::Communication(_)));
    assert!(err.to_string().contains("epfl/station1/white/Fill"));
}

#[test]
fn health_turns_stale_when_clock_advances() {
    let backend = sim(1, 0.0);
    let clock = TestClock::new();
    let shared: SharedClock = Arc::new(clock.clone());
    let plant = Plant::start(cfg(1, 10_000), &backend, shared).unwrap();
    let black = key(TankName::Black);

    assert!(wait_until(Duration::from_secs(2), || {
        plant.health(&black) == Some(TankHealth::Fresh)
    }));
    clock.advance(Duration::from_secs(3));
    assert_eq!(plant.health(&black), Some(TankHealth::Stale));
}

#[test]
fn second_writer_for_a_tank_is_rejected() {
    let backend = sim(1, 0.0);
    let plant = Plant::start(cfg(1, 50), &backend, MonotonicClock::shared()).unwrap();
    let cyan = key(TankName::Cyan);
    assert!(matches!(
        plant.state().register(cyan),
        Err(PlantError::WriterClaimed(k)) if k == cyan
    ));
}

#[test]
fn invalid_station_count_is_rejected() {
    let backend = sim(1, 0.0);
    let err = Plant::start(cfg(7, 50), &backend, MonotonicClock::shared())
        .err()
        .unwrap();
    assert!(err.to_string().contains("stations must be in 1..=6"));
}

#[test]
fn every_configured_station_is_polled() {
    let backend = sim(3, 0.0);
    let plant = Plant::start(cfg(3, 10), &backend, MonotonicClock::shared()).unwrap();
    assert_eq!(plant.keys().len(), 18);
    assert!(wait_until(Duration::from_secs(3), || {
        plant.state().snapshot().iter().all(|(_, s)| s.is_some())
    }));
}

#[test]
fn unconsumed_events_are_dropped_oldest_first() {
    let backend = sim(1, 0.0);
    let mut c = cfg(1, 5);
    c.event_capacity = 4;
    let plant = Plant::start(c, &backend, MonotonicClock::shared()).unwrap();
    assert!(wait_until(Duration::from_secs(2), || plant.dropped_events() > 0));
    assert!(plant.events().len() <= 4);
}

#[test]
fn stop_returns_promptly_during_long_interval() {
    let backend = sim(2, 0.0);
    let mut plant = Plant::start(cfg(2, 10_000), &backend, MonotonicClock::shared()).unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        plant.state().get(&key(TankName::Cyan)).is_some()
    }));
    let started = Instant::now();
    plant.stop();
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn float_variable_round_trips_through_backend() {
    let backend = sim(1, 0.0);
    let mut valve = backend.float_variable("epfl/station1/yellow", "valve").unwrap();
    assert_eq!(valve.write(0.65).unwrap(), 0.65);
    assert_eq!(valve.read().unwrap(), 0.65);
}
