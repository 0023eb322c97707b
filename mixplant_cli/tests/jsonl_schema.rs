use assert_cmd::prelude::*;
use serde_json::Value;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| l.starts_with('{'))
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn monitor_json_lines_have_stable_fields() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(
        &cfg,
        "[topology]\nstations = 1\n[polling]\ninterval_ms = 10\n[commands]\nsettle_ms = 10\n[simulation]\ndrain_per_read = 0.05\n",
    )
    .unwrap();

    let out = Command::cargo_bin("mixplant_cli")
        .unwrap()
        .args(["--config"])
        .arg(&cfg)
        .args(["--json", "monitor", "--seconds", "2", "--valve", "1/magenta=1"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let lines = json_lines(&out.stdout);
    let alarms: Vec<&Value> = lines.iter().filter(|v| v["type"] == "alarm").collect();
    assert!(!alarms.is_empty());
    for a in &alarms {
        assert_eq!(a["tank"], "station1/magenta");
        assert!(a["threshold"].is_f64());
        assert!(a["message"].as_str().unwrap().ends_with("% remaining"));
        assert!(a["timestamp"].is_string());
    }

    let tanks: Vec<&Value> = lines.iter().filter(|v| v["type"] == "tank").collect();
    assert_eq!(tanks.len(), 6);
    for t in &tanks {
        for field in ["tank", "level", "flow", "valve", "color", "health", "concern"] {
            assert!(t.get(field).is_some(), "missing {field} in {t}");
        }
    }
    let magenta = tanks.iter().find(|t| t["tank"] == "station1/magenta").unwrap();
    assert!(magenta["concern"].is_string());

    let summary = lines.iter().find(|v| v["type"] == "summary").unwrap();
    assert_eq!(summary["alarms"].as_u64(), Some(alarms.len() as u64));
}

#[test]
fn json_errors_carry_reason() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("cfg.toml");
    fs::write(&cfg, "[events]\ncapacity = 0\n").unwrap();

    let out = Command::cargo_bin("mixplant_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .args(["--json", "self-check"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let line = stderr.lines().rev().find(|l| l.contains("\"reason\"")).unwrap();
    let v: Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "Config");
    assert!(v["message"].as_str().unwrap().contains("events.capacity must be >= 1"));
}
