//! Error taxonomy for dispatch operations.
//!
//! Losing the accept race is an expected business outcome and is therefore
//! *not* in this enum; see [crate::lifecycle::AcceptOutcome]. Variants here
//! are either caller mistakes (stale state, unknown IDs) or structural
//! violations worth logging.

use crate::ecs::{DriverId, RideId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    /// Coordinate update attempted while the driver is offline.
    #[error("driver {0:?} is not online")]
    NotOnline(DriverId),

    /// No presence record exists for the driver.
    #[error("unknown driver {0:?}")]
    UnknownDriver(DriverId),

    /// No ride with this ID.
    #[error("unknown ride {0:?}")]
    UnknownRide(RideId),

    /// The driver was never matched to this ride.
    #[error("no queue entry for driver {driver:?} on ride {ride:?}")]
    NoQueueEntry { ride: RideId, driver: DriverId },

    /// A queue or ride action was attempted from a state that does not
    /// permit it. Indicates a client bug or stale client state.
    #[error("invalid transition: {action} from {from}")]
    InvalidTransition {
        action: &'static str,
        from: &'static str,
    },

    /// Latitude/longitude outside the valid range.
    #[error("invalid coordinates: lat {lat}, lng {lng}")]
    InvalidCoordinates { lat: f64, lng: f64 },
}
