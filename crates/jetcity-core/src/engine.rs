//! The tick scheduler and engine facade.
//!
//! One `CityEngine` owns the whole simulation. External collaborators drive it
//! with `tick(dt)` calls, mutate hazards through the forwarding API, and read
//! back the per-tick snapshot. `tick` is synchronous and completes in full, so
//! a driver that stops calling it has paused the simulation between ticks,
//! never inside one.
//!
//! Sub-phase order within a tick is fixed:
//! 1. expire and snapshot hazards — every agent sees the same view;
//! 2. scan the previous tick's airborne positions for proximity conflicts;
//! 3. step agents in roster order against that view (parking occupancy
//!    settles through the allocator as agents step, sequentially);
//! 4. publish the immutable snapshot for renderers and telemetry.

use crate::agent::{FlightAgent, InstructionSink, StepContext};
use crate::conflict::CollisionDetector;
use crate::errors::{ConfigError, EngineError};
use crate::geometry::Point;
use crate::hazards::{HazardId, HazardRegistry, Severity};
use crate::models::{AgentSnapshot, AgentSpec, AgentStatus, TickReport};
use crate::parking::ParkingAllocator;
use crate::placement::random_land_point;
use crate::rules::FlightRules;
use crate::terrain::{Terrain, TerrainMap};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;

/// One-time city setup.
#[derive(Debug, Clone)]
pub struct CityConfig {
    pub map: TerrainMap,
    pub parking_slot_count: u32,
    pub roster: Vec<AgentSpec>,
    pub rules: FlightRules,
    /// Seed for the engine RNG; identical seeds replay identical runs.
    pub seed: u64,
    /// How many roster agents start parked instead of airborne.
    pub spawn_parked: usize,
}

/// The flight coordination engine.
pub struct CityEngine {
    map: TerrainMap,
    rules: FlightRules,
    agents: Vec<FlightAgent>,
    parking: ParkingAllocator,
    hazards: HazardRegistry,
    detector: CollisionDetector,
    rng: ChaCha8Rng,
    tick: u64,
    /// Airborne positions as of the last completed tick; agents and the
    /// conflict scan read these, never in-progress updates.
    prev_positions: Vec<(String, Point)>,
    snapshot_cache: Vec<AgentSnapshot>,
    tracked: BTreeSet<String>,
}

impl CityEngine {
    /// Validate the configuration and seed the city.
    ///
    /// Bad rasters, an empty roster, or zero slots are fatal here; nothing
    /// later in the simulation is allowed to fail the whole run.
    pub fn configure(config: CityConfig) -> Result<Self, ConfigError> {
        let CityConfig {
            map,
            parking_slot_count,
            roster,
            rules,
            seed,
            spawn_parked,
        } = config;

        if parking_slot_count == 0 {
            return Err(ConfigError::NoParkingSlots);
        }
        if roster.is_empty() {
            return Err(ConfigError::EmptyRoster);
        }
        if spawn_parked > parking_slot_count as usize {
            return Err(ConfigError::PreParkExceedsSlots {
                requested: spawn_parked,
                slots: parking_slot_count,
            });
        }
        let mut seen = BTreeSet::new();
        for spec in &roster {
            if !seen.insert(spec.callsign.as_str()) {
                return Err(ConfigError::DuplicateCallsign(spec.callsign.clone()));
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        // Slot pads are fixed for the life of the city.
        let mut pads = Vec::with_capacity(parking_slot_count as usize);
        for _ in 0..parking_slot_count {
            let pad = random_land_point(&map, &mut rng, rules.placement_margin_px).map_err(
                |source| ConfigError::Placement {
                    what: "parking slots",
                    source,
                },
            )?;
            pads.push(pad);
        }
        let mut parking = ParkingAllocator::new(pads);

        let mut agents = Vec::with_capacity(roster.len());
        for (index, spec) in roster.into_iter().enumerate() {
            if index < spawn_parked {
                let spawn =
                    random_land_point(&map, &mut rng, rules.placement_margin_px).map_err(
                        |source| ConfigError::Placement {
                            what: "agent spawn",
                            source,
                        },
                    )?;
                let slot = parking.allocate_nearest(spawn, &spec.callsign).map_err(|_| {
                    ConfigError::PreParkExceedsSlots {
                        requested: spawn_parked,
                        slots: parking_slot_count,
                    }
                })?;
                let pad = parking
                    .slot(slot)
                    .map(|s| s.position)
                    .unwrap_or(spawn);
                agents.push(FlightAgent::spawn_parked(spec, slot, pad, &rules));
            } else {
                let spawn =
                    random_land_point(&map, &mut rng, rules.placement_margin_px).map_err(
                        |source| ConfigError::Placement {
                            what: "agent spawn",
                            source,
                        },
                    )?;
                let destination =
                    random_land_point(&map, &mut rng, rules.placement_margin_px).map_err(
                        |source| ConfigError::Placement {
                            what: "agent destination",
                            source,
                        },
                    )?;
                agents.push(FlightAgent::spawn(spec, spawn, destination, &rules));
            }
        }

        let detector = CollisionDetector::new(rules.proximity_threshold_px);
        let snapshot_cache = agents.iter().map(|a| a.snapshot()).collect();
        let prev_positions = airborne_positions(&agents);

        tracing::info!(
            agents = agents.len(),
            slots = parking_slot_count,
            "city configured ({}x{})",
            map.width(),
            map.height()
        );

        Ok(Self {
            map,
            rules,
            agents,
            parking,
            hazards: HazardRegistry::new(),
            detector,
            rng,
            tick: 0,
            prev_positions,
            snapshot_cache,
            tracked: BTreeSet::new(),
        })
    }

    /// Advance the simulation by one step of `dt` seconds.
    ///
    /// Transient failures come back as warnings in the report; an `Err` means
    /// an invariant broke and the tick was aborted.
    pub fn tick(&mut self, dt: f64) -> Result<TickReport, EngineError> {
        self.tick += 1;
        let tick = self.tick;

        let hazards = self.hazards.snapshot_at(tick);
        let conflicts = self.detector.find_conflicts(&self.prev_positions);

        let mut warnings = Vec::new();
        for agent in &mut self.agents {
            let mut ctx = StepContext {
                dt,
                hazards: &hazards,
                rules: &self.rules,
                parking: &mut self.parking,
                map: &self.map,
                rng: &mut self.rng,
                warnings: &mut warnings,
            };
            agent.step(&mut ctx)?;
        }

        self.prev_positions = airborne_positions(&self.agents);
        self.snapshot_cache = self.agents.iter().map(|a| a.snapshot()).collect();

        Ok(TickReport {
            tick,
            conflicts,
            warnings,
        })
    }

    /// The read-only per-tick view, in roster order.
    ///
    /// Stable between ticks: repeated calls return identical data.
    pub fn snapshot(&self) -> &[AgentSnapshot] {
        &self.snapshot_cache
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn rules(&self) -> &FlightRules {
        &self.rules
    }

    pub fn map(&self) -> &TerrainMap {
        &self.map
    }

    pub fn parking(&self) -> &ParkingAllocator {
        &self.parking
    }

    // ---- hazard reporter API (forwarded) ----

    pub fn report_accident(&self, center: Point, radius: f64, severity: Severity) -> HazardId {
        self.hazards
            .report_accident(center, radius, severity, self.tick, None)
    }

    /// Report an accident that clears itself after `ticks`.
    pub fn report_accident_for(
        &self,
        center: Point,
        radius: f64,
        severity: Severity,
        ticks: u64,
    ) -> HazardId {
        self.hazards
            .report_accident(center, radius, severity, self.tick, Some(ticks))
    }

    pub fn clear_accident(&self, id: HazardId) -> bool {
        self.hazards.clear_accident(id)
    }

    pub fn set_weather(&self, severity: Severity) {
        self.hazards.set_weather(severity);
    }

    pub fn weather(&self) -> Severity {
        self.hazards.weather()
    }

    // ---- tracking-view API ----

    /// Subscribe a tracking view to a callsign. Read-only; the tracked set
    /// never influences the simulation.
    pub fn request_track(&mut self, callsign: &str) -> Option<AgentSnapshot> {
        let snapshot = self
            .snapshot_cache
            .iter()
            .find(|s| s.callsign == callsign)
            .cloned()?;
        self.tracked.insert(callsign.to_string());
        Some(snapshot)
    }

    pub fn release_track(&mut self, callsign: &str) -> bool {
        self.tracked.remove(callsign)
    }

    pub fn tracked(&self) -> impl Iterator<Item = &str> {
        self.tracked.iter().map(String::as_str)
    }

    // ---- typed instruction API ----

    /// Force an emergency on an agent; applied on its next step.
    pub fn declare_emergency(&mut self, callsign: &str) -> Result<(), EngineError> {
        let agent = self.agent_mut(callsign)?;
        agent.receive_emergency_directive();
        Ok(())
    }

    /// Reassign an agent's destination. The point must be on land.
    pub fn assign_destination(&mut self, callsign: &str, point: Point) -> Result<(), EngineError> {
        if !self.map.contains(point) {
            return Err(EngineError::DestinationNotLand);
        }
        if self.map.classify_point(point)? != Terrain::Land {
            return Err(EngineError::DestinationNotLand);
        }
        let agent = self.agent_mut(callsign)?;
        agent.receive_coordinate_instruction(point);
        Ok(())
    }

    /// Request a new altitude for an agent, clamped to the rules' band.
    pub fn assign_altitude(&mut self, callsign: &str, altitude_m: f64) -> Result<(), EngineError> {
        let rules = self.rules.clone();
        let agent = self.agent_mut(callsign)?;
        agent.receive_altitude_instruction(altitude_m, &rules);
        Ok(())
    }

    fn agent_mut(&mut self, callsign: &str) -> Result<&mut FlightAgent, EngineError> {
        self.agents
            .iter_mut()
            .find(|a| a.callsign() == callsign)
            .ok_or_else(|| EngineError::UnknownCallsign(callsign.to_string()))
    }
}

/// Positions of agents that are actually in the air. Parked and grounded
/// vehicles sit on pads and do not feed the proximity scan.
fn airborne_positions(agents: &[FlightAgent]) -> Vec<(String, Point)> {
    agents
        .iter()
        .filter(|a| {
            matches!(
                a.status(),
                AgentStatus::Cruise | AgentStatus::Detour | AgentStatus::Emergency
            )
        })
        .map(|a| (a.callsign().to_string(), a.position()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAND: [u8; 3] = [120, 120, 120];

    fn roster(count: usize) -> Vec<AgentSpec> {
        (0..count)
            .map(|i| {
                AgentSpec::new(
                    format!("JET-{:03}", i + 1),
                    i as u32 + 1,
                    "Skimmer Mk2",
                    "city works",
                )
            })
            .collect()
    }

    fn config(agents: usize, slots: u32) -> CityConfig {
        CityConfig {
            map: TerrainMap::uniform(100, 100, LAND).unwrap(),
            parking_slot_count: slots,
            roster: roster(agents),
            rules: FlightRules::default(),
            seed: 11,
            spawn_parked: 0,
        }
    }

    #[test]
    fn test_configure_rejects_zero_slots() {
        let mut cfg = config(3, 5);
        cfg.parking_slot_count = 0;
        assert!(matches!(
            CityEngine::configure(cfg),
            Err(ConfigError::NoParkingSlots)
        ));
    }

    #[test]
    fn test_configure_rejects_empty_roster() {
        let mut cfg = config(3, 5);
        cfg.roster.clear();
        assert!(matches!(
            CityEngine::configure(cfg),
            Err(ConfigError::EmptyRoster)
        ));
    }

    #[test]
    fn test_configure_rejects_duplicate_callsigns() {
        let mut cfg = config(2, 5);
        cfg.roster[1].callsign = cfg.roster[0].callsign.clone();
        assert!(matches!(
            CityEngine::configure(cfg),
            Err(ConfigError::DuplicateCallsign(_))
        ));
    }

    #[test]
    fn test_configure_rejects_all_water_map() {
        let mut cfg = config(2, 5);
        cfg.map = TerrainMap::uniform(100, 100, [30, 80, 200]).unwrap();
        assert!(matches!(
            CityEngine::configure(cfg),
            Err(ConfigError::Placement { .. })
        ));
    }

    #[test]
    fn test_spawn_parked_occupies_slots() {
        let mut cfg = config(4, 6);
        cfg.spawn_parked = 2;
        let engine = CityEngine::configure(cfg).unwrap();
        assert_eq!(engine.parking().occupied_count(), 2);
        let parked = engine
            .snapshot()
            .iter()
            .filter(|s| s.status == AgentStatus::Parked)
            .count();
        assert_eq!(parked, 2);
    }

    #[test]
    fn test_snapshot_is_idempotent_between_ticks() {
        let mut engine = CityEngine::configure(config(5, 5)).unwrap();
        engine.tick(0.05).unwrap();
        let first = engine.snapshot().to_vec();
        let second = engine.snapshot().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn test_snapshot_order_follows_roster() {
        let engine = CityEngine::configure(config(5, 5)).unwrap();
        let callsigns: Vec<_> = engine.snapshot().iter().map(|s| s.callsign.clone()).collect();
        assert_eq!(
            callsigns,
            vec!["JET-001", "JET-002", "JET-003", "JET-004", "JET-005"]
        );
    }

    #[test]
    fn test_identical_seeds_replay_identically() {
        let mut a = CityEngine::configure(config(8, 5)).unwrap();
        let mut b = CityEngine::configure(config(8, 5)).unwrap();
        for _ in 0..200 {
            a.tick(0.05).unwrap();
            b.tick(0.05).unwrap();
        }
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn test_track_request_and_release() {
        let mut engine = CityEngine::configure(config(3, 5)).unwrap();
        let snap = engine.request_track("JET-002").unwrap();
        assert_eq!(snap.callsign, "JET-002");
        assert!(engine.release_track("JET-002"));
        assert!(!engine.release_track("JET-002"));
        assert!(engine.request_track("JET-999").is_none());
    }

    #[test]
    fn test_tracking_does_not_perturb_simulation() {
        let mut a = CityEngine::configure(config(4, 5)).unwrap();
        let mut b = CityEngine::configure(config(4, 5)).unwrap();
        b.request_track("JET-001");
        for _ in 0..50 {
            a.tick(0.05).unwrap();
            b.tick(0.05).unwrap();
        }
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn test_assign_destination_rejects_water() {
        let mut cfg = config(2, 5);
        // Left half land, right half water.
        let mut data = Vec::new();
        for _y in 0..100u32 {
            for x in 0..100u32 {
                let rgb = if x < 50 { LAND } else { [30, 80, 200] };
                data.extend_from_slice(&rgb);
            }
        }
        cfg.map = TerrainMap::from_rgb8(100, 100, &data).unwrap();
        let mut engine = CityEngine::configure(cfg).unwrap();

        assert!(matches!(
            engine.assign_destination("JET-001", Point::new(80.0, 50.0)),
            Err(EngineError::DestinationNotLand)
        ));
        assert!(engine
            .assign_destination("JET-001", Point::new(20.0, 50.0))
            .is_ok());
        assert!(matches!(
            engine.assign_destination("JET-404", Point::new(20.0, 50.0)),
            Err(EngineError::UnknownCallsign(_))
        ));
    }

    #[test]
    fn test_no_two_agents_share_a_slot() {
        let mut cfg = config(6, 6);
        cfg.rules.parked_dwell_ticks = 5;
        let mut engine = CityEngine::configure(cfg).unwrap();
        for _ in 0..2000 {
            engine.tick(0.05).unwrap();
            let mut occupied: Vec<_> = engine
                .parking()
                .slots()
                .iter()
                .filter_map(|s| s.occupant.clone())
                .collect();
            occupied.sort();
            occupied.dedup();
            let total = engine.parking().occupied_count();
            assert_eq!(occupied.len(), total);
        }
    }
}
