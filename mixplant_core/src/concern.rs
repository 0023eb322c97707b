//! Warning tint for tank level labels.
//!
//! The tint starts at the first alarm threshold of the tank's role: supply
//! tanks turn orange-to-red and more opaque as they approach empty (below
//! 20% by default); the mixer does the same approaching full (above 80%).

use std::fmt;

use crate::alarm::AlarmThresholds;
use crate::types::TankRole;

/// Label tint as `rgba(red, green, 0, alpha)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Concern {
    pub red: u8,
    pub green: u8,
    pub alpha: f64,
}

impl fmt::Display for Concern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, 0, {:.2})", self.red, self.green, self.alpha)
    }
}

fn channel(v: f64) -> u8 {
    v.trunc().clamp(0.0, 255.0) as u8
}

/// Tint for `level`, or `None` when the level has not reached the role's
/// first alarm threshold.
pub fn concern(role: TankRole, level: f64, thresholds: &AlarmThresholds) -> Option<Concern> {
    let onset = *thresholds.for_role(role).thresholds.first()?;
    // 0 at the onset, 1 at the limit (full for the mixer, empty for supply)
    let depth = match role {
        TankRole::Mixer if level >= onset => (level - onset) / (1.0 - onset).max(f64::EPSILON),
        TankRole::Supply if level <= onset => (onset - level) / onset.max(f64::EPSILON),
        _ => return None,
    };
    let depth = depth.clamp(0.0, 1.0);
    Some(Concern {
        red: 255,
        green: channel(255.0 * (1.0 - depth)),
        alpha: 0.4 + 0.6 * depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::ThresholdSet;

    fn defaults() -> AlarmThresholds {
        AlarmThresholds::default()
    }

    #[test]
    fn no_tint_in_normal_band() {
        assert_eq!(concern(TankRole::Mixer, 0.5, &defaults()), None);
        assert_eq!(concern(TankRole::Supply, 0.5, &defaults()), None);
    }

    #[test]
    fn mixer_tint_deepens_towards_full() {
        let at_80 = concern(TankRole::Mixer, 0.8, &defaults()).unwrap();
        assert_eq!(at_80.green, 255);
        assert!((at_80.alpha - 0.4).abs() < 1e-9);
        let full = concern(TankRole::Mixer, 1.0, &defaults()).unwrap();
        assert_eq!(full.green, 0);
        assert!((full.alpha - 1.0).abs() < 1e-9);
    }

    #[test]
    fn supply_tint_deepens_towards_empty() {
        let empty = concern(TankRole::Supply, 0.0, &defaults()).unwrap();
        assert_eq!(empty.green, 0);
        assert!((empty.alpha - 1.0).abs() < 1e-9);
        let low = concern(TankRole::Supply, 0.1, &defaults()).unwrap();
        assert_eq!(low.green, 127);
        assert_eq!(low.to_string(), "rgba(255, 127, 0, 0.70)");
    }

    #[test]
    fn tint_follows_configured_thresholds() {
        let custom = AlarmThresholds {
            mixer: ThresholdSet::ascending(vec![0.6, 0.9]),
            supply: ThresholdSet::descending(vec![0.3, 0.1]),
        };
        assert_eq!(concern(TankRole::Mixer, 0.7, &defaults()), None);
        let mixer = concern(TankRole::Mixer, 0.7, &custom).unwrap();
        assert!(mixer.alpha > 0.4 && mixer.alpha < 1.0);
        assert_eq!(concern(TankRole::Mixer, 0.6, &custom).unwrap().green, 255);

        assert_eq!(concern(TankRole::Supply, 0.25, &defaults()), None);
        let supply = concern(TankRole::Supply, 0.15, &custom).unwrap();
        assert_eq!(supply.green, 127);
        assert_eq!(supply.to_string(), "rgba(255, 127, 0, 0.70)");
    }
}
