//! Dual-threshold edge alarms.
//!
//! A `DualThresholdAlarm` remembers only the previous level of its tank. A
//! threshold fires when the step from the previous sample to the current one
//! crosses it in the configured direction. There is no exit band: a level
//! oscillating around a threshold fires on every crossing.

use std::fmt;

use chrono::{DateTime, Local};

use crate::types::{TankKey, TankRole};

/// Timestamp layout used in alarm lines.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Fires when `last < t <= level`.
    Ascending,
    /// Fires when `last > t >= level`.
    Descending,
}

/// Ordered thresholds for one tank role.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSet {
    pub direction: Direction,
    pub thresholds: Vec<f64>,
}

impl ThresholdSet {
    pub fn ascending(thresholds: Vec<f64>) -> Self {
        Self {
            direction: Direction::Ascending,
            thresholds,
        }
    }

    pub fn descending(thresholds: Vec<f64>) -> Self {
        Self {
            direction: Direction::Descending,
            thresholds,
        }
    }

    /// Thresholds crossed by the step `last -> level`, in list order.
    pub fn crossed(&self, last: f64, level: f64) -> impl Iterator<Item = f64> + '_ {
        let dir = self.direction;
        self.thresholds.iter().copied().filter(move |&t| match dir {
            Direction::Ascending => last < t && t <= level,
            Direction::Descending => last > t && t >= level,
        })
    }

    fn suffix(&self) -> &'static str {
        match self.direction {
            Direction::Ascending => "full",
            Direction::Descending => "remaining",
        }
    }
}

/// Per-role threshold configuration shared by every detector in the plant.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmThresholds {
    pub mixer: ThresholdSet,
    pub supply: ThresholdSet,
}

impl Default for AlarmThresholds {
    fn default() -> Self {
        Self {
            mixer: ThresholdSet::ascending(vec![0.8, 0.9]),
            supply: ThresholdSet::descending(vec![0.2, 0.1]),
        }
    }
}

impl AlarmThresholds {
    pub fn for_role(&self, role: TankRole) -> &ThresholdSet {
        match role {
            TankRole::Mixer => &self.mixer,
            TankRole::Supply => &self.supply,
        }
    }
}

/// An alarm raised for one tank. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmRecord {
    pub timestamp: DateTime<Local>,
    pub key: TankKey,
    /// The threshold that was crossed.
    pub threshold: f64,
    /// The sampled level that crossed it.
    pub level: f64,
    /// e.g. "80% full", "10% remaining"
    pub message: String,
}

impl fmt::Display for AlarmRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} : {} : {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.key,
            self.message
        )
    }
}

/// `level` truncated to the nearest 10%, as a whole percentage.
#[inline]
pub fn truncated_percent(level: f64) -> u32 {
    ((level * 10.0).trunc().max(0.0) as u32) * 10
}

/// Edge detector for one (station, tank).
#[derive(Debug, Clone)]
pub struct DualThresholdAlarm {
    key: TankKey,
    set: ThresholdSet,
    last: Option<f64>,
}

impl DualThresholdAlarm {
    pub fn new(key: TankKey, set: ThresholdSet) -> Self {
        Self {
            key,
            set,
            last: None,
        }
    }

    /// Detector using the thresholds for the tank's role.
    pub fn for_key(key: TankKey, thresholds: &AlarmThresholds) -> Self {
        Self::new(key, thresholds.for_role(key.tank.role()).clone())
    }

    pub fn key(&self) -> TankKey {
        self.key
    }

    pub fn last_level(&self) -> Option<f64> {
        self.last
    }

    pub fn evaluate(&mut self, level: f64) -> Vec<AlarmRecord> {
        self.evaluate_at(level, Local::now())
    }

    /// Feed one sample. The first sample never fires; `last` is always
    /// updated afterwards.
    pub fn evaluate_at(&mut self, level: f64, at: DateTime<Local>) -> Vec<AlarmRecord> {
        let fired = match self.last {
            None => Vec::new(),
            Some(last) => {
                let pct = truncated_percent(level);
                let suffix = self.set.suffix();
                self.set
                    .crossed(last, level)
                    .map(|threshold| AlarmRecord {
                        timestamp: at,
                        key: self.key,
                        threshold,
                        level,
                        message: format!("{pct}% {suffix}"),
                    })
                    .collect()
            }
        };
        self.last = Some(level);
        fired
    }
}
