#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing and validation must reject bad input with an error, never a panic.
    if let Ok(cfg) = mixplant_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A valid config always names at least one station and a positive cadence
            assert!(cfg.topology.stations >= 1);
            assert!(cfg.polling.interval_ms >= 1);
        }
    }
});
