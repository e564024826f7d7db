//! Published data models for the engine boundary.

use crate::conflict::Conflict;
use crate::geometry::Point;
use crate::hazards::HazardId;
use serde::{Deserialize, Serialize};

/// Roster entry describing one vehicle.
///
/// Serial, model, and owner are display metadata; the engine keys everything
/// on the callsign and never branches on the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub callsign: String,
    pub serial: u32,
    pub model: String,
    pub owner: String,
}

impl AgentSpec {
    pub fn new(
        callsign: impl Into<String>,
        serial: u32,
        model: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            callsign: callsign.into(),
            serial,
            model: model.into(),
            owner: owner.into(),
        }
    }
}

/// Flight state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Normal flight toward the destination
    Cruise,
    /// Temporarily steering around a hazard
    Detour,
    /// Diverting to the nearest free parking slot
    Emergency,
    /// Occupying a parking slot
    Parked,
    /// Frozen by a weather advisory; resumes when it lifts
    Grounded,
}

/// Read-only per-agent view published once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub callsign: String,
    pub position: Point,
    pub heading_rad: f64,
    pub speed_px_s: f64,
    pub altitude_m: f64,
    pub status: AgentStatus,
    pub destination: Point,
}

/// Recovered failures surfaced to the log/telemetry collaborator.
///
/// These are never errors across the tick boundary; the simulation keeps
/// running and the affected agent holds instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum WarningEvent {
    NoLandFound { callsign: String },
    NoFreeSlot { callsign: String },
    DetourStarted { callsign: String, hazard: HazardId },
}

/// Result of one completed tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: u64,
    pub conflicts: Vec<Conflict>,
    pub warnings: Vec<WarningEvent>,
}
