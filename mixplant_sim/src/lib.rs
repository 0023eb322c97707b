//! In-memory stand-in for the remote tank devices.
//!
//! `SimPlant` is a register bank keyed by device path (`epfl/station1/cyan`).
//! It stores values and answers reads, writes and commands; it does not model
//! fill dynamics or colour blending. A small per-read drift driven by the
//! valve ratio lets alarms be exercised end to end.
pub mod error;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mixplant_traits::{
    Clock, MonotonicClock, RemoteBackend, RemoteCommand, RemoteError, RemoteVariable,
};

use crate::error::{Result, SimError};

/// Tanks registered per station: (name, is_mixer, initial colour).
const STATION_TANKS: [(&str, bool, &str); 6] = [
    ("cyan", false, "#00ffff"),
    ("magenta", false, "#ff00ff"),
    ("yellow", false, "#ffff00"),
    ("black", false, "#000000"),
    ("white", false, "#ffffff"),
    ("mixer", true, "#808080"),
];

/// Knobs shared by every simulated device.
#[derive(Debug, Clone, Copy)]
pub struct SimSettings {
    /// Level change per `level` read at a fully open valve.
    pub drain_per_read: f64,
    /// Reported outflow (l/s) at a fully open valve.
    pub nominal_flow: f64,
    /// Artificial latency added to every read.
    pub read_latency: Duration,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            drain_per_read: 0.0,
            nominal_flow: 1.0,
            read_latency: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone)]
struct DeviceRegs {
    mixer: bool,
    level: f64,
    valve: f64,
    color: String,
    offline: bool,
    latency: Duration,
}

#[derive(Debug)]
struct SimInner {
    devices: HashMap<String, DeviceRegs>,
    settings: SimSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Register {
    Level,
    Flow,
    Valve,
    Color,
}

impl Register {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "level" => Some(Self::Level),
            "flow" => Some(Self::Flow),
            "valve" => Some(Self::Valve),
            "color" => Some(Self::Color),
            _ => None,
        }
    }

    fn is_text(self) -> bool {
        matches!(self, Self::Color)
    }
}

/// Shared handle to the simulated register bank. Clones refer to the same devices.
#[derive(Debug, Clone)]
pub struct SimPlant {
    inner: Arc<Mutex<SimInner>>,
}

impl SimPlant {
    pub fn new(settings: SimSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimInner {
                devices: HashMap::new(),
                settings,
            })),
        }
    }

    /// Register `stations` stations of six tanks each under `prefix`.
    /// Supply tanks start full, the mixer starts empty, all valves closed.
    pub fn with_topology(prefix: &str, stations: u8, settings: SimSettings) -> Self {
        let plant = Self::new(settings);
        for n in 1..=stations {
            for (tank, mixer, color) in STATION_TANKS {
                let level = if mixer { 0.0 } else { 1.0 };
                plant.add_device(&format!("{prefix}/station{n}/{tank}"), mixer, level, color);
            }
        }
        tracing::debug!(prefix, stations, "simulated plant registered");
        plant
    }

    pub fn add_device(&self, device: &str, mixer: bool, level: f64, color: &str) {
        if let Ok(mut g) = self.inner.lock() {
            let latency = g.settings.read_latency;
            g.devices.insert(
                device.to_string(),
                DeviceRegs {
                    mixer,
                    level: level.clamp(0.0, 1.0),
                    valve: 0.0,
                    color: color.to_string(),
                    offline: false,
                    latency,
                },
            );
        }
    }

    /// Unregister a device so that later resolution fails.
    pub fn remove_device(&self, device: &str) {
        if let Ok(mut g) = self.inner.lock() {
            g.devices.remove(device);
        }
    }

    pub fn set_level(&self, device: &str, level: f64) {
        self.with_device(device, |d| d.level = level.clamp(0.0, 1.0));
    }

    pub fn set_color(&self, device: &str, color: &str) {
        self.with_device(device, |d| d.color = color.to_string());
    }

    /// While offline every read, write and command on the device fails.
    pub fn set_offline(&self, device: &str, offline: bool) {
        self.with_device(device, |d| d.offline = offline);
    }

    pub fn set_read_latency(&self, device: &str, latency: Duration) {
        self.with_device(device, |d| d.latency = latency);
    }

    pub fn level(&self, device: &str) -> Option<f64> {
        self.inner.lock().ok()?.devices.get(device).map(|d| d.level)
    }

    pub fn valve(&self, device: &str) -> Option<f64> {
        self.inner.lock().ok()?.devices.get(device).map(|d| d.valve)
    }

    fn with_device(&self, device: &str, f: impl FnOnce(&mut DeviceRegs)) {
        if let Ok(mut g) = self.inner.lock()
            && let Some(d) = g.devices.get_mut(device)
        {
            f(d);
        }
    }

    fn online<T>(
        &self,
        device: &str,
        f: impl FnOnce(&mut DeviceRegs, &SimSettings) -> Result<T>,
    ) -> Result<T> {
        let mut g = self.inner.lock().map_err(|_| SimError::Poisoned)?;
        let SimInner { devices, settings } = &mut *g;
        let regs = devices
            .get_mut(device)
            .ok_or_else(|| SimError::NoSuchDevice(device.to_string()))?;
        if regs.offline {
            return Err(SimError::Offline(device.to_string()));
        }
        f(regs, settings)
    }

    fn latency(&self, device: &str) -> Duration {
        self.inner
            .lock()
            .ok()
            .and_then(|g| g.devices.get(device).map(|d| d.latency))
            .unwrap_or(Duration::ZERO)
    }

    fn resolve(&self, device: &str, name: &str, text: bool) -> Result<Register> {
        let g = self.inner.lock().map_err(|_| SimError::Poisoned)?;
        if !g.devices.contains_key(device) {
            return Err(SimError::NoSuchDevice(device.to_string()));
        }
        let reg = Register::parse(name).ok_or_else(|| SimError::NoSuchVariable {
            device: device.to_string(),
            name: name.to_string(),
        })?;
        if reg.is_text() != text {
            return Err(SimError::TypeMismatch(format!("{device}/{name}")));
        }
        Ok(reg)
    }

    fn read_float(&self, device: &str, reg: Register) -> Result<f64> {
        // Sleep outside the lock so a slow device never stalls its neighbours.
        MonotonicClock::new().sleep(self.latency(device));
        self.online(device, |d, settings| match reg {
            Register::Level => {
                let step = settings.drain_per_read * d.valve;
                d.level = if d.mixer {
                    (d.level + step).min(1.0)
                } else {
                    (d.level - step).max(0.0)
                };
                Ok(d.level)
            }
            Register::Flow => Ok(if d.level > 0.0 {
                d.valve * settings.nominal_flow
            } else {
                0.0
            }),
            Register::Valve => Ok(d.valve),
            Register::Color => Err(SimError::TypeMismatch(format!("{device}/color"))),
        })
    }

    fn write_float(&self, device: &str, reg: Register, value: f64) -> Result<f64> {
        if reg != Register::Valve {
            return Err(SimError::ReadOnly(format!("{device}/{reg:?}").to_lowercase()));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(SimError::OutOfRange(value));
        }
        self.online(device, |d, _| {
            d.valve = value;
            Ok(d.valve)
        })
    }

    fn read_color(&self, device: &str) -> Result<String> {
        MonotonicClock::new().sleep(self.latency(device));
        self.online(device, |d, _| Ok(d.color.clone()))
    }
}

/// Numeric register handle (`level`, `flow`, `valve`).
#[derive(Debug)]
pub struct SimFloat {
    plant: SimPlant,
    device: String,
    reg: Register,
}

impl RemoteVariable<f64> for SimFloat {
    fn read(&mut self) -> std::result::Result<f64, RemoteError> {
        Ok(self.plant.read_float(&self.device, self.reg)?)
    }

    fn write(&mut self, value: f64) -> std::result::Result<f64, RemoteError> {
        self.plant.write_float(&self.device, self.reg, value)?;
        // Acknowledge with a read-back, as the device server does.
        Ok(self.plant.online(&self.device, |d, _| Ok(d.valve))?)
    }
}

/// Text register handle (`color`, hex `#rrggbb`).
#[derive(Debug)]
pub struct SimText {
    plant: SimPlant,
    device: String,
}

impl RemoteVariable<String> for SimText {
    fn read(&mut self) -> std::result::Result<String, RemoteError> {
        Ok(self.plant.read_color(&self.device)?)
    }

    fn write(&mut self, _value: String) -> std::result::Result<String, RemoteError> {
        Err(Box::new(SimError::ReadOnly(format!("{}/color", self.device))))
    }
}

#[derive(Debug, Clone, Copy)]
enum SimOp {
    Fill,
    Flush,
}

/// `Fill` / `Flush` command handle; both return the new level.
#[derive(Debug)]
pub struct SimCommand {
    plant: SimPlant,
    device: String,
    op: SimOp,
}

impl RemoteCommand for SimCommand {
    fn invoke(&mut self, _args: &[f64]) -> std::result::Result<f64, RemoteError> {
        let op = self.op;
        let level = self.plant.online(&self.device, |d, _| {
            d.level = match op {
                SimOp::Fill => 1.0,
                SimOp::Flush => 0.0,
            };
            Ok(d.level)
        })?;
        tracing::debug!(device = %self.device, ?op, level, "simulated command");
        Ok(level)
    }
}

impl RemoteBackend for SimPlant {
    fn float_variable(
        &self,
        device: &str,
        name: &str,
    ) -> std::result::Result<Box<dyn RemoteVariable<f64>>, RemoteError> {
        let reg = self.resolve(device, name, false)?;
        Ok(Box::new(SimFloat {
            plant: self.clone(),
            device: device.to_string(),
            reg,
        }))
    }

    fn text_variable(
        &self,
        device: &str,
        name: &str,
    ) -> std::result::Result<Box<dyn RemoteVariable<String>>, RemoteError> {
        self.resolve(device, name, true)?;
        Ok(Box::new(SimText {
            plant: self.clone(),
            device: device.to_string(),
        }))
    }

    fn command(
        &self,
        device: &str,
        name: &str,
    ) -> std::result::Result<Box<dyn RemoteCommand>, RemoteError> {
        let op = match name {
            "Fill" => SimOp::Fill,
            "Flush" => SimOp::Flush,
            _ => {
                return Err(Box::new(SimError::NoSuchCommand {
                    device: device.to_string(),
                    name: name.to_string(),
                }));
            }
        };
        let exists = self
            .inner
            .lock()
            .map_err(|_| SimError::Poisoned)?
            .devices
            .contains_key(device);
        if !exists {
            return Err(Box::new(SimError::NoSuchDevice(device.to_string())));
        }
        Ok(Box::new(SimCommand {
            plant: self.clone(),
            device: device.to_string(),
            op,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CYAN: &str = "epfl/station1/cyan";
    const MIXER: &str = "epfl/station1/mixer";

    #[test]
    fn topology_registers_six_tanks_per_station() {
        let plant = SimPlant::with_topology("epfl", 2, SimSettings::default());
        assert_eq!(plant.level(CYAN), Some(1.0));
        assert_eq!(plant.level(MIXER), Some(0.0));
        assert_eq!(plant.level("epfl/station2/white"), Some(1.0));
        assert_eq!(plant.level("epfl/station3/white"), None);
    }

    #[test]
    fn level_drifts_with_open_valve() {
        let settings = SimSettings {
            drain_per_read: 0.1,
            ..SimSettings::default()
        };
        let plant = SimPlant::with_topology("epfl", 1, settings);
        let mut valve = plant.float_variable(CYAN, "valve").unwrap();
        let mut level = plant.float_variable(CYAN, "level").unwrap();
        assert_eq!(level.read().unwrap(), 1.0);
        valve.write(0.5).unwrap();
        let l = level.read().unwrap();
        assert!((l - 0.95).abs() < 1e-9, "got {l}");
    }

    #[test]
    fn fill_and_flush_set_levels() {
        let plant = SimPlant::with_topology("epfl", 1, SimSettings::default());
        plant.set_level(CYAN, 0.3);
        let mut fill = plant.command(CYAN, "Fill").unwrap();
        assert_eq!(fill.invoke(&[]).unwrap(), 1.0);
        let mut flush = plant.command(MIXER, "Flush").unwrap();
        plant.set_level(MIXER, 0.7);
        assert_eq!(flush.invoke(&[]).unwrap(), 0.0);
    }
}
