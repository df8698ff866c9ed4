use std::collections::HashMap;

use bevy_ecs::prelude::{Component, Entity, Resource};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinates;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DriverId(pub u64);

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RideId(pub u64);

/// Timing class of a ride request. Instant rides are matched within a tight
/// radius; scheduled rides draw from the full available pool since drivers
/// can reposition before departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RideTiming {
    Instant,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RideStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl RideStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Pending => "pending",
            RideStatus::Accepted => "accepted",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    RiderRequested,
    NoDriverAvailable,
}

/// One ride request. Spawned as an entity on submission; `status` is mutated
/// only through [crate::lifecycle] transition functions.
#[derive(Debug, Clone, Copy, PartialEq, Component)]
pub struct Ride {
    pub id: RideId,
    pub status: RideStatus,
    pub pickup: Coordinates,
    pub dropoff: Coordinates,
    pub timing: RideTiming,
    /// Departure time for scheduled rides (ms); `None` for instant rides.
    pub scheduled_at_ms: Option<u64>,
    /// Fare estimate supplied by the pricing collaborator; not computed here.
    pub estimated_cost: f64,
    /// Set if and only if status is Accepted, InProgress or Completed.
    pub driver: Option<DriverId>,
    pub requested_at_ms: u64,
    pub cancel_reason: Option<CancelReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueEntryStatus {
    Viewing,
    Interested,
    Accepted,
    Declined,
    Expired,
}

impl QueueEntryStatus {
    /// Accepted, Declined and Expired are terminal; no entry ever leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueueEntryStatus::Accepted | QueueEntryStatus::Declined | QueueEntryStatus::Expired
        )
    }

    /// Viewing and Interested entries can still act on the ride.
    pub fn is_active(&self) -> bool {
        matches!(self, QueueEntryStatus::Viewing | QueueEntryStatus::Interested)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueEntryStatus::Viewing => "viewing",
            QueueEntryStatus::Interested => "interested",
            QueueEntryStatus::Accepted => "accepted",
            QueueEntryStatus::Declined => "declined",
            QueueEntryStatus::Expired => "expired",
        }
    }
}

/// One driver's candidacy record for one ride. Never deleted; terminal
/// entries are retained for audit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueEntry {
    pub driver: DriverId,
    pub status: QueueEntryStatus,
    pub distance_to_pickup_km: f64,
    pub viewed_at_ms: u64,
    /// When the entry reached a terminal state.
    pub resolved_at_ms: Option<u64>,
}

/// Re-match bookkeeping for a pending ride: how many sweeps have run, used
/// to widen the radius geometrically per attempt.
#[derive(Debug, Clone, Copy, Default, Component)]
pub struct RematchState {
    pub attempts: u32,
}

/// Lookup from public ride IDs to their entities. Callers hold IDs, never
/// entity references.
#[derive(Debug, Default, Resource)]
pub struct RideIndex {
    rides: HashMap<RideId, Entity>,
}

impl RideIndex {
    pub fn insert(&mut self, id: RideId, entity: Entity) {
        self.rides.insert(id, entity);
    }

    pub fn get(&self, id: RideId) -> Option<Entity> {
        self.rides.get(&id).copied()
    }
}
