pub mod agent;
pub mod conflict;
pub mod engine;
pub mod errors;
pub mod geometry;
pub mod hazards;
pub mod models;
pub mod parking;
pub mod placement;
pub mod rules;
pub mod terrain;

pub use agent::{FlightAgent, InstructionSink};
pub use conflict::{CollisionDetector, Conflict};
pub use engine::{CityConfig, CityEngine};
pub use errors::{ConfigError, EngineError, ParkingError, PlacementError, TerrainError};
pub use geometry::Point;
pub use hazards::{HazardEvent, HazardId, HazardKind, HazardRegistry, HazardSnapshot, Severity};
pub use models::{AgentSnapshot, AgentSpec, AgentStatus, TickReport, WarningEvent};
pub use parking::{ParkingAllocator, ParkingSlot, SlotId};
pub use placement::{random_land_point, MAX_PLACEMENT_ATTEMPTS};
pub use rules::{EmergencyPolicy, FlightRules};
pub use terrain::{Terrain, TerrainMap};
