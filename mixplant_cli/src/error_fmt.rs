//! Human-readable error descriptions and structured JSON error formatting.

use mixplant_core::error::{CommunicationError, FailureKind, PlantError};

fn plant_error(err: &eyre::Report) -> Option<&PlantError> {
    err.chain().find_map(|e| e.downcast_ref::<PlantError>())
}

fn communication(ce: &CommunicationError) -> String {
    match ce.kind {
        FailureKind::Unreachable => format!(
            "What happened: {ce}.\nLikely causes: The device server is down, the device path is wrong, or remote.prefix does not match the deployment.\nHow to fix: Check that `{}` exists and is online, then rerun.",
            ce.target
        ),
        FailureKind::Rejected => format!(
            "What happened: {ce}.\nLikely causes: The device refused the value (read-only variable or out-of-range ratio).\nHow to fix: Only valves are writable and ratios must be in [0.0, 1.0]."
        ),
        FailureKind::Malformed => format!(
            "What happened: {ce}.\nLikely causes: The device returned a value of the wrong type or format.\nHow to fix: Check the device server version; colours must be `#rrggbb`."
        ),
        FailureKind::Other => format!(
            "What happened: {ce}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        ),
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(pe) = plant_error(err) {
        return match pe {
            PlantError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/mixplant.toml for a sample."
            ),
            PlantError::UnknownStation(n) => format!(
                "What happened: Station {n} is not part of the plant.\nLikely causes: A --valve/--fill/--flush key names a station beyond topology.stations.\nHow to fix: Use a station in 1..=topology.stations, or raise topology.stations (max 6)."
            ),
            PlantError::UnknownTank(name) => format!(
                "What happened: Unknown tank `{name}`.\nLikely causes: A misspelled tank name.\nHow to fix: Use one of cyan, magenta, yellow, black, white, mixer."
            ),
            PlantError::UnsupportedCommand { command, key } => format!(
                "What happened: {command} is not available on {key}.\nLikely causes: Fill only applies to supply tanks and Flush only to the mixer.\nHow to fix: Use --fill with a supply tank or --flush with the mixer."
            ),
            PlantError::TankUnavailable(key) => format!(
                "What happened: {key} is unavailable.\nLikely causes: Its remote variables could not be resolved at start.\nHow to fix: Check that the device exists under remote.prefix and restart."
            ),
            PlantError::Communication(ce) => communication(ce),
            PlantError::WriterClaimed(key) => format!(
                "What happened: {key} was registered twice.\nLikely causes: The same station was started more than once.\nHow to fix: This is a bug; re-run with --log-level=debug and report the log."
            ),
        };
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 for configuration, 3 for topology or command errors, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match plant_error(err) {
        Some(PlantError::Config(_)) => 2,
        Some(_) => 3,
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match plant_error(err) {
        Some(PlantError::Config(_)) => "Config",
        Some(PlantError::UnknownStation(_)) => "UnknownStation",
        Some(PlantError::UnknownTank(_)) => "UnknownTank",
        Some(PlantError::UnsupportedCommand { .. }) => "UnsupportedCommand",
        Some(PlantError::TankUnavailable(_)) => "TankUnavailable",
        Some(PlantError::Communication(_)) => "Communication",
        Some(PlantError::WriterClaimed(_)) => "WriterClaimed",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let msg = humanize(err);
    let obj = match plant_error(err) {
        Some(PlantError::Communication(ce)) => json!({
            "reason": reason_name(err),
            "details": { "op": ce.op.to_string(), "target": ce.target, "detail": ce.detail },
            "message": msg,
        }),
        _ => json!({ "reason": reason_name(err), "message": msg }),
    };
    obj.to_string()
}
