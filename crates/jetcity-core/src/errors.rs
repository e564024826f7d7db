//! Error taxonomy for the engine.
//!
//! Configuration errors are fatal at setup. Placement and parking errors are
//! transient and recovered by loiter/hold behavior inside the tick; they only
//! surface as warnings. Anything returned from `CityEngine::tick` itself is an
//! invariant violation and aborts the tick.

use crate::parking::SlotId;
use thiserror::Error;

/// Raised by terrain queries outside the raster.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TerrainError {
    #[error("coordinate ({x}, {y}) outside raster {width}x{height}")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },
}

/// Raised when the placement service cannot find a land point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlacementError {
    #[error("no land point found after {attempts} attempts")]
    NoLandFound { attempts: u32 },
}

/// Raised by the parking allocator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParkingError {
    /// Transient: every slot is taken. Callers fall back to a loiter hold.
    #[error("no free parking slot")]
    NoFreeSlot,
    /// Defensive check: release of a slot nobody occupies.
    #[error("slot {0} is not occupied")]
    SlotNotOccupied(SlotId),
    #[error("slot {0} does not exist")]
    UnknownSlot(SlotId),
    /// Invariant violation: a grant would double-book a slot.
    #[error("slot {slot} is already occupied by {occupant}")]
    AlreadyOccupied { slot: SlotId, occupant: String },
}

/// Fatal configuration errors; abort startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bad terrain raster: {0}")]
    BadRaster(String),
    #[error("parking slot count must be non-zero")]
    NoParkingSlots,
    #[error("agent roster is empty")]
    EmptyRoster,
    #[error("duplicate callsign in roster: {0}")]
    DuplicateCallsign(String),
    #[error("cannot pre-park {requested} agents into {slots} slots")]
    PreParkExceedsSlots { requested: usize, slots: u32 },
    #[error("failed to seed {what}: {source}")]
    Placement {
        what: &'static str,
        #[source]
        source: PlacementError,
    },
}

/// Invariant violations surfaced from `tick` or the engine command API.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown callsign: {0}")]
    UnknownCallsign(String),
    #[error("destination is not on land")]
    DestinationNotLand,
    #[error(transparent)]
    Terrain(#[from] TerrainError),
    #[error(transparent)]
    Parking(#[from] ParkingError),
}
