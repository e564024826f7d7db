//! Fixed parking slots with single-occupant allocation.
//!
//! Slots are seeded once from the placement service at configuration time and
//! never relocated. Occupancy is mutated only here; the engine steps agents
//! sequentially within a tick, so two agents can never race for one slot.

use crate::errors::ParkingError;
use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a parking slot. Lower ids win distance ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(pub u32);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{:03}", self.0)
    }
}

/// A fixed landing pad on land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkingSlot {
    pub id: SlotId,
    pub position: Point,
    /// Callsign of the current occupant, if any.
    pub occupant: Option<String>,
}

/// Allocator over the fixed slot set.
#[derive(Debug, Clone)]
pub struct ParkingAllocator {
    slots: Vec<ParkingSlot>,
}

impl ParkingAllocator {
    /// Build the allocator from pre-placed land points.
    pub fn new(positions: Vec<Point>) -> Self {
        let slots = positions
            .into_iter()
            .enumerate()
            .map(|(i, position)| ParkingSlot {
                id: SlotId(i as u32),
                position,
                occupant: None,
            })
            .collect();
        Self { slots }
    }

    /// Grant the nearest free slot to `point`, marking it occupied.
    ///
    /// Ties on distance are broken by lowest slot id so allocation order is
    /// deterministic. Fails with `NoFreeSlot` when everything is taken.
    pub fn allocate_nearest(
        &mut self,
        point: Point,
        callsign: &str,
    ) -> Result<SlotId, ParkingError> {
        let mut best: Option<(f64, SlotId)> = None;
        for slot in self.slots.iter().filter(|s| s.occupant.is_none()) {
            let dist = slot.position.distance_to(point);
            let better = match best {
                None => true,
                Some((best_dist, best_id)) => {
                    dist < best_dist || (dist == best_dist && slot.id < best_id)
                }
            };
            if better {
                best = Some((dist, slot.id));
            }
        }

        let (_, id) = best.ok_or(ParkingError::NoFreeSlot)?;
        self.grant(id, callsign)?;
        Ok(id)
    }

    /// Mark a specific slot occupied.
    fn grant(&mut self, id: SlotId, callsign: &str) -> Result<(), ParkingError> {
        let slot = self
            .slots
            .get_mut(id.0 as usize)
            .ok_or(ParkingError::UnknownSlot(id))?;
        if let Some(occupant) = &slot.occupant {
            return Err(ParkingError::AlreadyOccupied {
                slot: id,
                occupant: occupant.clone(),
            });
        }
        slot.occupant = Some(callsign.to_string());
        Ok(())
    }

    /// Release an occupied slot.
    ///
    /// Releasing a free slot is a `SlotNotOccupied` error. Not expected in the
    /// normal flow, but it catches broken occupancy bookkeeping loudly.
    pub fn release(&mut self, id: SlotId) -> Result<(), ParkingError> {
        let slot = self
            .slots
            .get_mut(id.0 as usize)
            .ok_or(ParkingError::UnknownSlot(id))?;
        if slot.occupant.is_none() {
            return Err(ParkingError::SlotNotOccupied(id));
        }
        slot.occupant = None;
        Ok(())
    }

    pub fn slot(&self, id: SlotId) -> Option<&ParkingSlot> {
        self.slots.get(id.0 as usize)
    }

    pub fn slots(&self) -> &[ParkingSlot] {
        &self.slots
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|s| s.occupant.is_some()).count()
    }

    pub fn free_count(&self) -> usize {
        self.slots.len() - self.occupied_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator() -> ParkingAllocator {
        ParkingAllocator::new(vec![
            Point::new(10.0, 10.0),
            Point::new(50.0, 50.0),
            Point::new(90.0, 10.0),
        ])
    }

    #[test]
    fn test_allocates_nearest_free() {
        let mut parking = allocator();
        let id = parking.allocate_nearest(Point::new(48.0, 52.0), "JET-001").unwrap();
        assert_eq!(id, SlotId(1));
        assert_eq!(
            parking.slot(id).unwrap().occupant.as_deref(),
            Some("JET-001")
        );
    }

    #[test]
    fn test_skips_occupied_slots() {
        let mut parking = allocator();
        parking.allocate_nearest(Point::new(50.0, 50.0), "JET-001").unwrap();
        let id = parking.allocate_nearest(Point::new(50.0, 50.0), "JET-002").unwrap();
        assert_ne!(id, SlotId(1));
    }

    #[test]
    fn test_tie_breaks_by_lowest_id() {
        // Equidistant from slots 0 and 2.
        let mut parking = allocator();
        let id = parking.allocate_nearest(Point::new(50.0, 10.0), "JET-001").unwrap();
        assert_eq!(id, SlotId(0));
    }

    #[test]
    fn test_exhaustion_returns_no_free_slot() {
        let mut parking = allocator();
        for i in 0..3 {
            parking
                .allocate_nearest(Point::new(0.0, 0.0), &format!("JET-{i:03}"))
                .unwrap();
        }
        let err = parking
            .allocate_nearest(Point::new(0.0, 0.0), "JET-999")
            .unwrap_err();
        assert_eq!(err, ParkingError::NoFreeSlot);
    }

    #[test]
    fn test_release_frees_slot() {
        let mut parking = allocator();
        let id = parking.allocate_nearest(Point::new(10.0, 10.0), "JET-001").unwrap();
        parking.release(id).unwrap();
        assert!(parking.slot(id).unwrap().occupant.is_none());
        assert_eq!(parking.free_count(), 3);
    }

    #[test]
    fn test_release_of_free_slot_is_error() {
        let mut parking = allocator();
        let err = parking.release(SlotId(0)).unwrap_err();
        assert_eq!(err, ParkingError::SlotNotOccupied(SlotId(0)));
    }

    #[test]
    fn test_release_of_unknown_slot_is_error() {
        let mut parking = allocator();
        let err = parking.release(SlotId(99)).unwrap_err();
        assert_eq!(err, ParkingError::UnknownSlot(SlotId(99)));
    }

    #[test]
    fn test_occupants_stay_unique() {
        let mut parking = allocator();
        let a = parking.allocate_nearest(Point::new(10.0, 10.0), "JET-001").unwrap();
        let b = parking.allocate_nearest(Point::new(10.0, 10.0), "JET-002").unwrap();
        let c = parking.allocate_nearest(Point::new(10.0, 10.0), "JET-003").unwrap();
        let mut ids = vec![a, b, c];
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
}
