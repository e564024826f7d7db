//! Flight rules and thresholds for the coordination engine.

use crate::hazards::Severity;
use serde::{Deserialize, Serialize};

/// How emergencies are triggered.
///
/// The fault condition is deliberately pluggable: either nothing fires
/// spontaneously and collaborators declare emergencies explicitly, or a
/// per-agent per-tick probability is rolled on the engine RNG so runs stay
/// reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum EmergencyPolicy {
    Never,
    Probability { per_tick: f64 },
}

/// Configuration for the flight rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightRules {
    /// Proximity threshold for conflict pairs in map pixels
    pub proximity_threshold_px: f64,
    /// How far ahead along the current heading hazards are scanned
    pub lookahead_px: f64,
    /// Arrival distance; closer than this snaps to the target
    pub arrival_epsilon_px: f64,
    /// Extra clearance added around a hazard radius when detouring
    pub avoidance_margin_px: f64,
    /// Orbit radius of the loiter/hold pattern
    pub loiter_radius_px: f64,
    /// Angular rate of the loiter orbit in radians per second
    pub loiter_rate_rad_s: f64,
    /// Weather severity at or above which all flights are grounded
    pub grounding_severity: Severity,
    /// Ticks a parked agent dwells before picking a new destination
    pub parked_dwell_ticks: u32,
    /// Border margin for random placement in map pixels
    pub placement_margin_px: u32,
    /// Cruise speed in map pixels per second
    pub cruise_speed_px_s: f64,
    /// Minimum allowed altitude in meters
    pub min_altitude_m: f64,
    /// Maximum allowed altitude in meters
    pub max_altitude_m: f64,
    /// Default cruise altitude in meters
    pub cruise_altitude_m: f64,
    pub emergency_policy: EmergencyPolicy,
}

impl Default for FlightRules {
    fn default() -> Self {
        Self {
            proximity_threshold_px: 12.0,
            lookahead_px: 60.0,
            arrival_epsilon_px: 2.0,
            avoidance_margin_px: 10.0,
            loiter_radius_px: 8.0,
            loiter_rate_rad_s: 0.6,
            grounding_severity: Severity::Severe,
            parked_dwell_ticks: 100,
            placement_margin_px: 8,
            cruise_speed_px_s: 3.0,
            min_altitude_m: 15.0,
            max_altitude_m: 120.0,
            cruise_altitude_m: 60.0,
            emergency_policy: EmergencyPolicy::Never,
        }
    }
}

impl FlightRules {
    pub fn clamp_altitude(&self, altitude_m: f64) -> f64 {
        altitude_m.clamp(self.min_altitude_m, self.max_altitude_m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_altitudes_are_ordered() {
        let rules = FlightRules::default();
        assert!(rules.min_altitude_m < rules.cruise_altitude_m);
        assert!(rules.cruise_altitude_m < rules.max_altitude_m);
    }

    #[test]
    fn test_clamp_altitude() {
        let rules = FlightRules::default();
        assert_eq!(rules.clamp_altitude(500.0), rules.max_altitude_m);
        assert_eq!(rules.clamp_altitude(0.0), rules.min_altitude_m);
        assert_eq!(rules.clamp_altitude(60.0), 60.0);
    }
}
