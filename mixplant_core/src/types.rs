//! Plant topology and per-tank state.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::error::PlantError;

/// Station identifier, 1..=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StationId(u8);

impl StationId {
    pub const MAX: u8 = mixplant_config::MAX_STATIONS;

    pub fn new(n: u8) -> Result<Self, PlantError> {
        if (1..=Self::MAX).contains(&n) {
            Ok(Self(n))
        } else {
            Err(PlantError::UnknownStation(n))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All stations 1..=count (count clamped to MAX).
    pub fn first(count: u8) -> impl Iterator<Item = StationId> {
        (1..=count.min(Self::MAX)).map(StationId)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "station{}", self.0)
    }
}

/// Whether a tank feeds paint into the station or collects the mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TankRole {
    Supply,
    Mixer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TankName {
    Cyan,
    Magenta,
    Yellow,
    Black,
    White,
    Mixer,
}

impl TankName {
    /// Every tank of a station, supply tanks first.
    pub const ALL: [TankName; 6] = [
        TankName::Cyan,
        TankName::Magenta,
        TankName::Yellow,
        TankName::Black,
        TankName::White,
        TankName::Mixer,
    ];

    pub fn role(self) -> TankRole {
        match self {
            TankName::Mixer => TankRole::Mixer,
            _ => TankRole::Supply,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TankName::Cyan => "cyan",
            TankName::Magenta => "magenta",
            TankName::Yellow => "yellow",
            TankName::Black => "black",
            TankName::White => "white",
            TankName::Mixer => "mixer",
        }
    }
}

impl fmt::Display for TankName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TankName {
    type Err = PlantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TankName::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PlantError::UnknownTank(s.to_string()))
    }
}

/// (station, tank) address; displays as `station<N>/<tank>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TankKey {
    pub station: StationId,
    pub tank: TankName,
}

impl TankKey {
    pub fn new(station: StationId, tank: TankName) -> Self {
        Self { station, tank }
    }

    /// Remote device path under `prefix`, e.g. `epfl/station1/cyan`.
    pub fn device_path(&self, prefix: &str) -> String {
        format!("{prefix}/{self}")
    }
}

impl fmt::Display for TankKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.station, self.tank)
    }
}

impl FromStr for TankKey {
    type Err = PlantError;

    /// Accepts `station<N>/<tank>` or the short `<N>/<tank>` form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (station, tank) = s
            .split_once('/')
            .ok_or_else(|| PlantError::UnknownTank(s.to_string()))?;
        let digits = station.strip_prefix("station").unwrap_or(station);
        let n: u8 = digits
            .parse()
            .map_err(|_| PlantError::UnknownTank(s.to_string()))?;
        Ok(TankKey::new(StationId::new(n)?, tank.parse()?))
    }
}

/// Paint colour as reported by the remote `color` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl FromStr for Rgb {
    type Err = String;

    /// Parses `#rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .trim()
            .strip_prefix('#')
            .ok_or_else(|| format!("colour {s:?} lacks leading '#'"))?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("colour {s:?} is not #rrggbb"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| format!("colour {s:?} is not hex"))
        };
        Ok(Rgb {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// One atomically published sample of a tank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TankState {
    /// 0.0..=1.0
    pub level: f64,
    /// l/s, >= 0
    pub flow: f64,
    /// 0.0..=1.0
    pub valve_ratio: f64,
    pub color: Rgb,
}

/// Freshness of a tank's published state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TankHealth {
    /// A round succeeded within the stale threshold.
    Fresh,
    /// No successful round within the stale threshold (or none yet).
    Stale,
    /// The tank's remote variables could not be resolved; nothing is polling it.
    Failed,
}

impl TankHealth {
    pub fn classify(
        failed: bool,
        last_ok: Option<Instant>,
        now: Instant,
        stale_after: Duration,
    ) -> Self {
        if failed {
            return TankHealth::Failed;
        }
        match last_ok {
            Some(t) if now.saturating_duration_since(t) <= stale_after => TankHealth::Fresh,
            _ => TankHealth::Stale,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TankHealth::Fresh => "fresh",
            TankHealth::Stale => "stale",
            TankHealth::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_parses_both_forms_and_round_trips_display() {
        let k: TankKey = "station3/mixer".parse().unwrap();
        assert_eq!(k.to_string(), "station3/mixer");
        let k: TankKey = "2/Cyan".parse().unwrap();
        assert_eq!(k, TankKey::new(StationId::new(2).unwrap(), TankName::Cyan));
        assert!("station7/cyan".parse::<TankKey>().is_err());
        assert!("station1/orange".parse::<TankKey>().is_err());
        assert!("cyan".parse::<TankKey>().is_err());
    }

    #[test]
    fn device_path_uses_prefix() {
        let k = TankKey::new(StationId::new(1).unwrap(), TankName::Black);
        assert_eq!(k.device_path("epfl"), "epfl/station1/black");
    }

    #[test]
    fn rgb_parses_hex() {
        let c: Rgb = "#ff8000".parse().unwrap();
        assert_eq!(c, Rgb { r: 255, g: 128, b: 0 });
        assert_eq!(c.to_string(), "#ff8000");
        assert!("ff8000".parse::<Rgb>().is_err());
        assert!("#ff80".parse::<Rgb>().is_err());
        assert!("#gg8000".parse::<Rgb>().is_err());
    }

    #[test]
    fn rgb_rejects_signed_channels() {
        assert!("#+1+2+3".parse::<Rgb>().is_err());
        assert!("#-1ff00".parse::<Rgb>().is_err());
    }

    #[test]
    fn only_mixer_has_mixer_role() {
        let mixers: Vec<_> = TankName::ALL
            .into_iter()
            .filter(|t| t.role() == TankRole::Mixer)
            .collect();
        assert_eq!(mixers, vec![TankName::Mixer]);
    }

    #[test]
    fn health_classification() {
        let now = Instant::now();
        let stale_after = Duration::from_millis(100);
        assert_eq!(
            TankHealth::classify(true, Some(now), now, stale_after),
            TankHealth::Failed
        );
        assert_eq!(
            TankHealth::classify(false, None, now, stale_after),
            TankHealth::Stale
        );
        assert_eq!(
            TankHealth::classify(false, Some(now), now + Duration::from_millis(50), stale_after),
            TankHealth::Fresh
        );
        assert_eq!(
            TankHealth::classify(false, Some(now), now + Duration::from_millis(150), stale_after),
            TankHealth::Stale
        );
    }
}
