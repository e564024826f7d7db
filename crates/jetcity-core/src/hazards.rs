//! Active accidents and the city-wide weather advisory.
//!
//! The registry is the one piece of shared state external reporters mutate
//! while the engine runs, so it lives behind a `DashMap`. Agents never read
//! it directly: the scheduler takes a `HazardSnapshot` at tick start and every
//! agent in that tick sees the same view.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use dashmap::DashMap;

/// Identifier of a reported hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HazardId(pub u64);

impl std::fmt::Display for HazardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HZ-{}", self.0)
    }
}

/// Severity scale shared by accidents and weather.
///
/// Ordered: weather at or above the grounding threshold stops all flights.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Advisory,
    Caution,
    Severe,
    Extreme,
}

/// What kind of hazard an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HazardKind {
    /// Localized accident with an affected circle.
    Accident { center: Point, radius: f64 },
    /// City-wide weather advisory; affects every agent uniformly.
    WeatherAdvisory,
}

/// One active hazard. Read-only to agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardEvent {
    pub id: HazardId,
    pub kind: HazardKind,
    pub severity: Severity,
    pub active: bool,
    pub created_tick: u64,
    /// Tick at which the hazard clears itself, if bounded.
    pub expires_tick: Option<u64>,
}

impl HazardEvent {
    /// Whether this hazard's area reaches within `radius` of `point`.
    /// Global advisories reach everywhere.
    pub fn affects(&self, point: Point, radius: f64) -> bool {
        match self.kind {
            HazardKind::Accident {
                center,
                radius: hazard_radius,
            } => center.distance_to(point) < hazard_radius + radius,
            HazardKind::WeatherAdvisory => true,
        }
    }
}

/// Consistent hazard view for one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardSnapshot {
    pub tick: u64,
    pub weather: Severity,
    pub accidents: Vec<HazardEvent>,
}

impl HazardSnapshot {
    /// Accidents whose circle intersects the query circle.
    pub fn hazards_near(&self, point: Point, radius: f64) -> Vec<&HazardEvent> {
        self.accidents
            .iter()
            .filter(|h| h.affects(point, radius))
            .collect()
    }
}

/// Process-wide hazard store.
///
/// Reporters call in from outside the tick loop; each operation is a single
/// atomic map access, so the engine never observes a half-applied change.
#[derive(Debug)]
pub struct HazardRegistry {
    accidents: DashMap<HazardId, HazardEvent>,
    weather: RwLock<Severity>,
    next_id: AtomicU64,
}

impl Default for HazardRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HazardRegistry {
    pub fn new() -> Self {
        Self {
            accidents: DashMap::new(),
            weather: RwLock::new(Severity::Advisory),
            next_id: AtomicU64::new(1),
        }
    }

    /// Record an accident. Returns its id for later clearance.
    pub fn report_accident(
        &self,
        center: Point,
        radius: f64,
        severity: Severity,
        current_tick: u64,
        expires_after_ticks: Option<u64>,
    ) -> HazardId {
        let id = HazardId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let event = HazardEvent {
            id,
            kind: HazardKind::Accident { center, radius },
            severity,
            active: true,
            created_tick: current_tick,
            expires_tick: expires_after_ticks.map(|d| current_tick + d),
        };
        tracing::info!(%id, ?severity, "accident reported at ({:.1}, {:.1}) r={radius:.0}", center.x, center.y);
        self.accidents.insert(id, event);
        id
    }

    /// Explicitly clear an accident. Returns false if it was already gone.
    pub fn clear_accident(&self, id: HazardId) -> bool {
        let removed = self.accidents.remove(&id).is_some();
        if removed {
            tracing::info!(%id, "accident cleared");
        }
        removed
    }

    /// Replace the city-wide weather severity.
    pub fn set_weather(&self, severity: Severity) {
        let mut weather = self.weather.write().unwrap_or_else(|e| e.into_inner());
        if *weather != severity {
            tracing::info!(?severity, "weather advisory updated");
        }
        *weather = severity;
    }

    pub fn weather(&self) -> Severity {
        *self.weather.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Drop accidents whose expiry tick has passed.
    pub fn expire(&self, current_tick: u64) {
        self.accidents.retain(|_, event| match event.expires_tick {
            Some(expiry) => expiry > current_tick,
            None => true,
        });
    }

    /// Query hazards reaching a point: nearby accidents, plus the city-wide
    /// advisory whenever the weather is above calm.
    pub fn hazards_near(&self, point: Point, radius: f64) -> Vec<HazardEvent> {
        let mut hits: Vec<HazardEvent> = self
            .accidents
            .iter()
            .filter(|entry| entry.value().affects(point, radius))
            .map(|entry| entry.value().clone())
            .collect();
        hits.sort_by_key(|h| h.id);
        let weather = self.weather();
        if weather > Severity::Advisory {
            hits.push(HazardEvent {
                // Reserved id: there is only ever one weather advisory.
                id: HazardId(0),
                kind: HazardKind::WeatherAdvisory,
                severity: weather,
                active: true,
                created_tick: 0,
                expires_tick: None,
            });
        }
        hits
    }

    /// Take the consistent per-tick view: expire, then copy.
    pub fn snapshot_at(&self, tick: u64) -> HazardSnapshot {
        self.expire(tick);
        let mut accidents: Vec<HazardEvent> = self
            .accidents
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        // Deterministic iteration order for agents regardless of map layout.
        accidents.sort_by_key(|h| h.id);
        HazardSnapshot {
            tick,
            weather: self.weather(),
            accidents,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_and_clear() {
        let registry = HazardRegistry::new();
        let id = registry.report_accident(Point::new(50.0, 50.0), 20.0, Severity::Caution, 0, None);
        assert_eq!(registry.snapshot_at(0).accidents.len(), 1);
        assert!(registry.clear_accident(id));
        assert!(!registry.clear_accident(id));
        assert!(registry.snapshot_at(0).accidents.is_empty());
    }

    #[test]
    fn test_expiry_removes_event() {
        let registry = HazardRegistry::new();
        registry.report_accident(Point::new(10.0, 10.0), 5.0, Severity::Severe, 10, Some(5));
        assert_eq!(registry.snapshot_at(14).accidents.len(), 1);
        assert!(registry.snapshot_at(15).accidents.is_empty());
    }

    #[test]
    fn test_hazards_near_filters_by_distance() {
        let registry = HazardRegistry::new();
        registry.report_accident(Point::new(10.0, 10.0), 5.0, Severity::Caution, 0, None);
        registry.report_accident(Point::new(90.0, 90.0), 5.0, Severity::Caution, 0, None);
        let near = registry.hazards_near(Point::new(12.0, 10.0), 1.0);
        assert_eq!(near.len(), 1);
        assert!(matches!(
            near[0].kind,
            HazardKind::Accident { center, .. } if center.x == 10.0
        ));
    }

    #[test]
    fn test_hazards_near_includes_weather_advisory() {
        let registry = HazardRegistry::new();
        assert!(registry.hazards_near(Point::new(0.0, 0.0), 1.0).is_empty());
        registry.set_weather(Severity::Caution);
        let hits = registry.hazards_near(Point::new(0.0, 0.0), 1.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, HazardKind::WeatherAdvisory);
        assert_eq!(hits[0].severity, Severity::Caution);
    }

    #[test]
    fn test_weather_ordering() {
        assert!(Severity::Severe >= Severity::Severe);
        assert!(Severity::Extreme > Severity::Severe);
        assert!(Severity::Caution < Severity::Severe);
    }

    #[test]
    fn test_snapshot_is_stable_between_mutations() {
        let registry = HazardRegistry::new();
        registry.report_accident(Point::new(10.0, 10.0), 5.0, Severity::Caution, 0, None);
        let snapshot = registry.snapshot_at(1);
        // Mutations after the snapshot are invisible to it.
        registry.report_accident(Point::new(20.0, 20.0), 5.0, Severity::Caution, 1, None);
        registry.set_weather(Severity::Extreme);
        assert_eq!(snapshot.accidents.len(), 1);
        assert_eq!(snapshot.weather, Severity::Advisory);
    }
}
