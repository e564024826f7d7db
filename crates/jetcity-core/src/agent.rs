//! Per-vehicle flight state machine.
//!
//! Each agent owns its kinematic state and reacts, once per tick, to the
//! hazard snapshot and the parking allocator. Steering is a direct bearing
//! toward the active target recomputed every tick; there is no offline path
//! planner.

use crate::errors::{EngineError, ParkingError};
use crate::geometry::{segment_intersects_circle, Point};
use crate::hazards::{HazardEvent, HazardKind, HazardSnapshot};
use crate::models::{AgentSnapshot, AgentSpec, AgentStatus, WarningEvent};
use crate::parking::{ParkingAllocator, SlotId};
use crate::placement::random_land_point;
use crate::rules::{EmergencyPolicy, FlightRules};
use crate::terrain::TerrainMap;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::f64::consts::FRAC_PI_2;

/// Why an agent is circling instead of progressing.
#[derive(Debug, Clone, Copy, PartialEq)]
enum HoldReason {
    /// Every slot was taken; retry allocation each tick.
    AwaitingSlot,
    /// Placement could not find a land destination; retry each tick.
    AwaitingDestination,
}

/// Loiter/hold orbit state.
#[derive(Debug, Clone, Copy)]
struct Loiter {
    anchor: Point,
    phase: f64,
    reason: HoldReason,
}

/// Typed instruction surface for external collaborators.
///
/// Replaces by-name dispatch with a direct contract: collaborators hold the
/// capability, not a reflection handle.
pub trait InstructionSink {
    /// Reassign the destination. The engine validates land before calling.
    fn receive_coordinate_instruction(&mut self, destination: Point);
    /// Request a new altitude, clamped to the rules' band.
    fn receive_altitude_instruction(&mut self, altitude_m: f64, rules: &FlightRules);
    /// Declare an emergency; takes effect on the next tick.
    fn receive_emergency_directive(&mut self);
}

/// Everything an agent may touch while stepping one tick.
pub(crate) struct StepContext<'a> {
    pub dt: f64,
    pub hazards: &'a HazardSnapshot,
    pub rules: &'a FlightRules,
    pub parking: &'a mut ParkingAllocator,
    pub map: &'a TerrainMap,
    pub rng: &'a mut ChaCha8Rng,
    pub warnings: &'a mut Vec<WarningEvent>,
}

/// One simulated vehicle.
#[derive(Debug, Clone)]
pub struct FlightAgent {
    spec: AgentSpec,
    position: Point,
    heading: f64,
    speed: f64,
    altitude_m: f64,
    destination: Point,
    status: AgentStatus,
    /// Assigned slot: reserved while inbound, occupied while parked.
    slot: Option<SlotId>,
    detour: Option<Point>,
    avoiding: Option<crate::hazards::HazardId>,
    /// Status to restore when a weather grounding lifts.
    resume: Option<AgentStatus>,
    dwell_remaining: u32,
    loiter: Option<Loiter>,
    pending_emergency: bool,
    /// Destination handed down by a collaborator, applied on the next step.
    pending_destination: Option<Point>,
}

impl FlightAgent {
    /// Spawn airborne, cruising toward `destination`.
    pub fn spawn(spec: AgentSpec, position: Point, destination: Point, rules: &FlightRules) -> Self {
        let heading = position.bearing_to(destination);
        Self {
            spec,
            position,
            heading,
            speed: rules.cruise_speed_px_s,
            altitude_m: rules.cruise_altitude_m,
            destination,
            status: AgentStatus::Cruise,
            slot: None,
            detour: None,
            avoiding: None,
            resume: None,
            dwell_remaining: 0,
            loiter: None,
            pending_emergency: false,
            pending_destination: None,
        }
    }

    /// Spawn already parked in `slot` at its fixed position.
    pub fn spawn_parked(
        spec: AgentSpec,
        slot: SlotId,
        slot_position: Point,
        rules: &FlightRules,
    ) -> Self {
        Self {
            spec,
            position: slot_position,
            heading: 0.0,
            speed: rules.cruise_speed_px_s,
            altitude_m: rules.min_altitude_m,
            destination: slot_position,
            status: AgentStatus::Parked,
            slot: Some(slot),
            detour: None,
            avoiding: None,
            resume: None,
            dwell_remaining: rules.parked_dwell_ticks,
            loiter: None,
            pending_emergency: false,
            pending_destination: None,
        }
    }

    pub fn callsign(&self) -> &str {
        &self.spec.callsign
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            callsign: self.spec.callsign.clone(),
            position: self.position,
            heading_rad: self.heading,
            speed_px_s: self.speed,
            altitude_m: self.altitude_m,
            status: self.status,
            destination: self.destination,
        }
    }

    /// Advance one tick.
    ///
    /// Transient placement/parking failures degrade to a loiter hold and a
    /// warning; only invariant violations propagate as errors.
    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EngineError> {
        // Weather gate first: grounding freezes everything, parked stays parked.
        let grounding = ctx.hazards.weather >= ctx.rules.grounding_severity;
        if grounding {
            if self.status != AgentStatus::Grounded {
                self.resume = Some(self.status);
                self.status = AgentStatus::Grounded;
                tracing::debug!(callsign = %self.spec.callsign, "grounded by weather");
            }
            return Ok(());
        }
        if self.status == AgentStatus::Grounded {
            self.status = self.resume.take().unwrap_or(AgentStatus::Cruise);
            tracing::debug!(callsign = %self.spec.callsign, status = ?self.status, "weather lifted, resuming");
        }

        // Apply a handed-down destination. PARKED agents cut their dwell and
        // depart toward it; EMERGENCY keeps it pending until back on a pad.
        if let Some(destination) = self.pending_destination {
            match self.status {
                AgentStatus::Parked => {
                    self.dwell_remaining = 0;
                }
                AgentStatus::Cruise | AgentStatus::Detour => {
                    self.pending_destination = None;
                    if let Some(slot) = self.slot.take() {
                        // Reservation no longer wanted.
                        ctx.parking.release(slot)?;
                    }
                    self.destination = destination;
                    self.detour = None;
                    self.avoiding = None;
                    self.loiter = None;
                    self.status = AgentStatus::Cruise;
                }
                AgentStatus::Emergency | AgentStatus::Grounded => {}
            }
        }

        // Emergency triggers apply to airborne states; a parked agent is
        // already on the ground, so a stale directive is dropped.
        let airborne = matches!(self.status, AgentStatus::Cruise | AgentStatus::Detour);
        if self.status == AgentStatus::Parked {
            self.pending_emergency = false;
        }
        let policy_fired = match ctx.rules.emergency_policy {
            EmergencyPolicy::Never => false,
            EmergencyPolicy::Probability { per_tick } => {
                airborne && per_tick > 0.0 && ctx.rng.gen_bool(per_tick.min(1.0))
            }
        };
        if airborne && (self.pending_emergency || policy_fired) {
            self.pending_emergency = false;
            self.begin_emergency(ctx)?;
        }

        match self.status {
            AgentStatus::Parked => self.step_parked(ctx),
            AgentStatus::Cruise => self.step_cruise(ctx),
            AgentStatus::Detour => self.step_detour(ctx),
            AgentStatus::Emergency => self.step_emergency(ctx),
            AgentStatus::Grounded => Ok(()),
        }
    }

    /// ANY -> EMERGENCY: reserve the nearest free slot and retarget it.
    fn begin_emergency(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EngineError> {
        if self.slot.is_none() {
            match ctx.parking.allocate_nearest(self.position, &self.spec.callsign) {
                Ok(slot) => self.slot = Some(slot),
                Err(ParkingError::NoFreeSlot) => {
                    tracing::warn!(callsign = %self.spec.callsign, "emergency with no free slot, holding");
                    ctx.warnings.push(WarningEvent::NoFreeSlot {
                        callsign: self.spec.callsign.clone(),
                    });
                    self.enter_hold(self.position, HoldReason::AwaitingSlot);
                    self.status = AgentStatus::Cruise;
                    return Ok(());
                }
                Err(other) => return Err(other.into()),
            }
        }
        // Slot reserved; its pad is the destination now, previous goal dropped.
        if let Some(slot) = self.slot.and_then(|id| ctx.parking.slot(id)) {
            self.destination = slot.position;
        }
        self.detour = None;
        self.avoiding = None;
        self.loiter = None;
        self.status = AgentStatus::Emergency;
        tracing::info!(callsign = %self.spec.callsign, "emergency declared, diverting to slot");
        Ok(())
    }

    fn step_parked(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EngineError> {
        // Position is pinned to the slot pad; only the dwell timer runs.
        if self.dwell_remaining > 0 {
            self.dwell_remaining -= 1;
            return Ok(());
        }
        let destination = match self.pending_destination.take() {
            Some(destination) => destination,
            None => match random_land_point(ctx.map, ctx.rng, ctx.rules.placement_margin_px) {
                Ok(destination) => destination,
                Err(_) => {
                    // Stay on the pad and retry next tick.
                    ctx.warnings.push(WarningEvent::NoLandFound {
                        callsign: self.spec.callsign.clone(),
                    });
                    tracing::warn!(callsign = %self.spec.callsign, "no destination found, staying parked");
                    return Ok(());
                }
            },
        };
        if let Some(slot) = self.slot.take() {
            ctx.parking.release(slot)?;
        }
        self.destination = destination;
        self.heading = self.position.bearing_to(destination);
        self.status = AgentStatus::Cruise;
        tracing::debug!(callsign = %self.spec.callsign, "departing slot");
        Ok(())
    }

    fn step_cruise(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EngineError> {
        if self.loiter.is_some() {
            return self.step_hold(ctx);
        }

        // Hazard scan along the heading before committing to the move.
        if let Some(hazard) = self.blocking_hazard(ctx.hazards, ctx.rules) {
            self.enter_detour(&hazard, ctx);
            self.fly_toward(self.detour.unwrap_or(self.destination), ctx);
            return Ok(());
        }

        self.fly_toward(self.destination, ctx);
        self.check_arrival(ctx)
    }

    fn step_detour(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EngineError> {
        // DETOUR -> CRUISE once the direct path is clear again.
        if self.blocking_hazard(ctx.hazards, ctx.rules).is_none() {
            self.detour = None;
            self.avoiding = None;
            self.status = AgentStatus::Cruise;
            self.fly_toward(self.destination, ctx);
            return self.check_arrival(ctx);
        }

        let waypoint = match self.detour {
            Some(waypoint) => waypoint,
            None => {
                // Shouldn't happen, but recover by re-planning off the scan.
                if let Some(hazard) = self.blocking_hazard(ctx.hazards, ctx.rules) {
                    self.enter_detour(&hazard, ctx);
                }
                self.detour.unwrap_or(self.destination)
            }
        };

        self.fly_toward(waypoint, ctx);
        if self.position.distance_to(waypoint) <= ctx.rules.arrival_epsilon_px {
            // Waypoint reached; next tick's scan decides whether another leg
            // around the circle is needed.
            self.detour = None;
            self.avoiding = None;
            self.status = AgentStatus::Cruise;
        }
        Ok(())
    }

    fn step_emergency(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EngineError> {
        self.fly_toward(self.destination, ctx);
        if self.position.distance_to(self.destination) <= ctx.rules.arrival_epsilon_px {
            self.finalize_parking(ctx)?;
        }
        Ok(())
    }

    /// Circle the hold anchor and retry whatever blocked us.
    fn step_hold(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EngineError> {
        let Some(mut loiter) = self.loiter else {
            return Ok(());
        };

        match loiter.reason {
            HoldReason::AwaitingSlot => {
                match ctx.parking.allocate_nearest(loiter.anchor, &self.spec.callsign) {
                    Ok(slot) => {
                        self.slot = Some(slot);
                        if let Some(slot) = ctx.parking.slot(slot) {
                            self.destination = slot.position;
                        }
                        self.loiter = None;
                        tracing::debug!(callsign = %self.spec.callsign, "slot freed, leaving hold");
                        self.fly_toward(self.destination, ctx);
                        return self.check_arrival(ctx);
                    }
                    Err(ParkingError::NoFreeSlot) => {}
                    Err(other) => return Err(other.into()),
                }
            }
            HoldReason::AwaitingDestination => {
                if let Ok(destination) =
                    random_land_point(ctx.map, ctx.rng, ctx.rules.placement_margin_px)
                {
                    self.destination = destination;
                    self.loiter = None;
                    tracing::debug!(callsign = %self.spec.callsign, "destination found, leaving hold");
                    self.fly_toward(destination, ctx);
                    return Ok(());
                }
            }
        }

        // Still blocked: fly the orbit.
        loiter.phase += ctx.rules.loiter_rate_rad_s * ctx.dt;
        let orbit = loiter
            .anchor
            .offset_by_bearing(ctx.rules.loiter_radius_px, loiter.phase);
        self.position = self.clamp_to_map(orbit, ctx.map);
        self.heading = loiter.phase + FRAC_PI_2;
        self.loiter = Some(loiter);
        Ok(())
    }

    /// CRUISE arrival: park if a slot is in reach, otherwise hold.
    fn check_arrival(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EngineError> {
        if self.position.distance_to(self.destination) > ctx.rules.arrival_epsilon_px {
            return Ok(());
        }

        if self.slot.is_some() {
            // Inbound leg to an already-reserved slot.
            return self.finalize_parking(ctx);
        }

        match ctx.parking.allocate_nearest(self.destination, &self.spec.callsign) {
            Ok(slot) => {
                self.slot = Some(slot);
                if let Some(slot) = ctx.parking.slot(slot) {
                    self.destination = slot.position;
                }
                // Pad within arrival reach parks immediately; otherwise fly
                // the short final leg next tick.
                if self.position.distance_to(self.destination) <= ctx.rules.arrival_epsilon_px {
                    return self.finalize_parking(ctx);
                }
                Ok(())
            }
            Err(ParkingError::NoFreeSlot) => {
                ctx.warnings.push(WarningEvent::NoFreeSlot {
                    callsign: self.spec.callsign.clone(),
                });
                tracing::warn!(callsign = %self.spec.callsign, "no free slot at destination, holding");
                self.enter_hold(self.destination, HoldReason::AwaitingSlot);
                Ok(())
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Snap to the pad and occupy the slot.
    fn finalize_parking(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EngineError> {
        let slot_id = match self.slot {
            Some(id) => id,
            None => return Ok(()),
        };
        let pad = ctx
            .parking
            .slot(slot_id)
            .map(|s| s.position)
            .ok_or(ParkingError::UnknownSlot(slot_id))?;
        self.position = pad;
        self.destination = pad;
        self.detour = None;
        self.avoiding = None;
        self.loiter = None;
        self.status = AgentStatus::Parked;
        self.dwell_remaining = ctx.rules.parked_dwell_ticks;
        tracing::debug!(callsign = %self.spec.callsign, slot = %slot_id, "parked");
        Ok(())
    }

    fn enter_hold(&mut self, anchor: Point, reason: HoldReason) {
        let phase = if anchor.distance_to(self.position) > 1e-9 {
            anchor.bearing_to(self.position)
        } else {
            self.heading - FRAC_PI_2
        };
        self.loiter = Some(Loiter {
            anchor,
            phase,
            reason,
        });
    }

    /// First active accident whose inflated circle cuts the lookahead segment.
    fn blocking_hazard(&self, hazards: &HazardSnapshot, rules: &FlightRules) -> Option<HazardEvent> {
        let to_target = self.position.distance_to(self.destination);
        if to_target <= rules.arrival_epsilon_px {
            return None;
        }
        let reach = to_target.min(rules.lookahead_px);
        let bearing = self.position.bearing_to(self.destination);
        let probe_end = self.position.offset_by_bearing(reach, bearing);

        hazards.accidents.iter().find_map(|hazard| {
            let HazardKind::Accident { center, radius } = hazard.kind else {
                return None;
            };
            let inflated = radius + rules.avoidance_margin_px;
            if segment_intersects_circle(self.position, probe_end, center, inflated) {
                Some(hazard.clone())
            } else {
                None
            }
        })
    }

    /// CRUISE -> DETOUR: plan a waypoint around the hazard circle.
    ///
    /// The waypoint sits past the tangent point of the inflated circle, so
    /// the leg toward it clears the hazard by the avoidance margin no matter
    /// how close the agent already is.
    fn enter_detour(&mut self, hazard: &HazardEvent, ctx: &mut StepContext<'_>) {
        let HazardKind::Accident { center, radius } = hazard.kind else {
            return;
        };
        let inflated = radius + ctx.rules.avoidance_margin_px;
        let dist = self.position.distance_to(center);

        let waypoint = if dist <= inflated {
            // Already inside the avoidance ring: push straight out.
            let out_bearing = if dist > 1e-9 {
                center.bearing_to(self.position)
            } else {
                self.position.bearing_to(self.destination) + FRAC_PI_2
            };
            center.offset_by_bearing(inflated + ctx.rules.avoidance_margin_px, out_bearing)
        } else {
            let to_center = self.position.bearing_to(center);
            // Deflect away from the side of the path the center sits on.
            let rel = wrap_angle(to_center - self.position.bearing_to(self.destination));
            let theta = (inflated / dist).asin();
            let tangent = if rel >= 0.0 {
                to_center - theta
            } else {
                to_center + theta
            };
            let reach = (dist * dist - inflated * inflated).sqrt() + inflated;
            self.position.offset_by_bearing(reach, tangent)
        };

        self.detour = Some(self.clamp_to_map(waypoint, ctx.map));
        self.avoiding = Some(hazard.id);
        if self.status != AgentStatus::Detour {
            self.status = AgentStatus::Detour;
            ctx.warnings.push(WarningEvent::DetourStarted {
                callsign: self.spec.callsign.clone(),
                hazard: hazard.id,
            });
            tracing::debug!(callsign = %self.spec.callsign, hazard = %hazard.id, "detouring around accident");
        }
    }

    /// Reactive steering: re-bear toward the target and advance `speed * dt`,
    /// snapping onto the target instead of overshooting.
    fn fly_toward(&mut self, target: Point, ctx: &StepContext<'_>) {
        let remaining = self.position.distance_to(target);
        if remaining <= ctx.rules.arrival_epsilon_px {
            self.position = target;
            return;
        }
        self.heading = self.position.bearing_to(target);
        let step = self.speed * ctx.dt;
        if step >= remaining {
            self.position = target;
        } else {
            let moved = self.position.offset_by_bearing(step, self.heading);
            self.position = self.clamp_to_map(moved, ctx.map);
        }
    }

    /// Positions must stay valid map coordinates.
    fn clamp_to_map(&self, point: Point, map: &TerrainMap) -> Point {
        Point::new(
            point.x.clamp(0.0, map.width() as f64 - 1.0),
            point.y.clamp(0.0, map.height() as f64 - 1.0),
        )
    }
}

/// Normalize an angle to (-pi, pi].
fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::PI;
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped == -PI {
        PI
    } else {
        wrapped
    }
}

impl InstructionSink for FlightAgent {
    fn receive_coordinate_instruction(&mut self, destination: Point) {
        // Applied on the next step, where the allocator is in reach for
        // releasing a slot or reservation.
        self.pending_destination = Some(destination);
    }

    fn receive_altitude_instruction(&mut self, altitude_m: f64, rules: &FlightRules) {
        self.altitude_m = rules.clamp_altitude(altitude_m);
    }

    fn receive_emergency_directive(&mut self) {
        self.pending_emergency = true;
    }
}
