#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Paint mixing plant monitoring engine (transport-agnostic).
//!
//! All remote interactions go through the `mixplant_traits::RemoteBackend`
//! capability traits, so the engine runs the same against the simulator and
//! a real device network.
//!
//! ## Architecture
//!
//! - **Polling**: one thread per tank reads level, flow, valve and colour each
//!   round and publishes the round as one snapshot (`poller` module)
//! - **State**: per-tank slots with a single writer each (`plant_state` module)
//! - **Alarms**: edge-triggered threshold crossings per tank (`alarm` module),
//!   collected in a bounded newest-first log (`alarm_log` module)
//! - **Commands**: debounced valve writes and Fill/Flush commands
//!   (`debounce` and `station` modules)
//! - **Events**: bounded queue toward the presentation side (`bus` module)

pub mod alarm;
pub mod alarm_log;
pub mod bus;
pub mod comm_error;
pub mod concern;
pub mod config;
pub mod conversions;
pub mod debounce;
pub mod error;
pub mod mocks;
pub mod plant;
pub mod plant_state;
pub mod poller;
pub mod station;
pub mod types;

pub use alarm::{AlarmRecord, AlarmThresholds, DualThresholdAlarm, ThresholdSet};
pub use alarm_log::AlarmLog;
pub use bus::{EventBus, PlantEvent};
pub use concern::{Concern, concern};
pub use config::{AlarmCfg, CommandCfg, PlantCfg, PollingCfg};
pub use error::{CommunicationError, FailureKind, PlantError, RemoteOp, Result};
pub use plant::Plant;
pub use plant_state::{PlantState, TankWriter};
pub use station::StationCoordinator;
pub use types::{Rgb, StationId, TankHealth, TankKey, TankName, TankRole, TankState};
