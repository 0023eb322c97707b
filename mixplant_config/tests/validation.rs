use mixplant_config::{load_path, load_toml};
use rstest::rstest;
use std::fs;

#[rstest]
#[case("[topology]\nstations = 0", "topology.stations must be in 1..=6")]
#[case("[topology]\nstations = 7", "topology.stations must be in 1..=6")]
#[case("[polling]\ninterval_ms = 0", "polling.interval_ms must be >= 1")]
#[case("[commands]\nsettle_ms = 0", "commands.settle_ms must be >= 1")]
#[case("[alarms]\nlog_capacity = 0", "alarms.log_capacity must be >= 1")]
#[case(
    "[alarms]\nmixer_thresholds = [0.9, 0.8]",
    "alarms.mixer_thresholds must be strictly ascending"
)]
#[case(
    "[alarms]\nsupply_thresholds = [0.1, 0.2]",
    "alarms.supply_thresholds must be strictly descending"
)]
#[case(
    "[alarms]\nsupply_thresholds = [1.2]",
    "alarms.supply_thresholds values must be in [0.0, 1.0]"
)]
#[case("[events]\ncapacity = 0", "events.capacity must be >= 1")]
#[case(
    "[health]\nstale_after_ms = 100",
    "health.stale_after_ms must be >= polling.interval_ms"
)]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation must be one of")]
#[case("[remote]\nprefix = \"\"", "remote.prefix must not be empty")]
fn rejects_invalid_values(#[case] toml: &str, #[case] expected: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(expected),
        "expected '{expected}', got '{err}'"
    );
}

#[test]
fn accepts_a_full_document() {
    let toml = r#"
[remote]
prefix = "plant2"

[topology]
stations = 2

[polling]
interval_ms = 100

[commands]
settle_ms = 150
close_valves_on_start = false

[alarms]
log_capacity = 20
mixer_thresholds = [0.5, 0.75, 0.95]
supply_thresholds = [0.3]

[events]
capacity = 16

[health]
stale_after_ms = 500

[logging]
level = "debug"
rotation = "daily"

[simulation]
drain_per_read = 0.02
read_latency_ms = 5
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.remote.prefix, "plant2");
    assert_eq!(cfg.alarms.mixer_thresholds.len(), 3);
    assert!(!cfg.commands.close_valves_on_start);
}

#[test]
fn unknown_type_is_a_parse_error() {
    assert!(load_toml("[polling]\ninterval_ms = \"fast\"").is_err());
}

#[test]
fn load_path_defaults_when_missing_and_validates_when_present() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let cfg = load_path(&missing).expect("defaults");
    assert_eq!(cfg.topology.stations, 6);

    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[alarms]\nlog_capacity = 0\n").unwrap();
    let err = load_path(&bad).expect_err("invalid");
    assert!(format!("{err}").contains("alarms.log_capacity"));
}

#[test]
fn shipped_sample_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../etc/mixplant.toml");
    let cfg = load_path(&path).expect("sample config");
    assert_eq!(cfg.remote.prefix, "epfl");
    assert_eq!(cfg.alarms.supply_thresholds, vec![0.2, 0.1]);
}
