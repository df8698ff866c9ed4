//! Matching: select candidate drivers for a ride and create queue entries.
//!
//! Instant rides filter the available pool by pickup distance; scheduled
//! rides take every available driver since there is lead time to reposition.
//! Ties are deliberately not broken here: several drivers may see the same
//! ride, and the acceptance queue resolves who wins.

use tracing::debug;

use crate::ecs::{DriverId, Ride, RideTiming};
use crate::presence::PresenceStore;
use crate::queue::AcceptanceQueue;

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// New `viewing` entries were created for these drivers (with their
    /// pickup distance in km). The caller broadcasts the opportunities.
    Enqueued(Vec<(DriverId, f64)>),
    /// No driver qualified; the ride stays pending with no new entries.
    NoCandidates,
}

/// Finds candidates for `ride` within `radius_km` (ignored for scheduled
/// rides) and creates `viewing` entries with the pickup distance
/// precomputed. Drivers already in the queue are skipped, so re-match
/// sweeps never duplicate entries.
pub fn match_and_enqueue(
    ride: &Ride,
    queue: &mut AcceptanceQueue,
    presence: &PresenceStore,
    radius_km: f64,
    now_ms: u64,
) -> MatchOutcome {
    let radius = match ride.timing {
        RideTiming::Instant => Some(radius_km),
        RideTiming::Scheduled => None,
    };

    let mut enqueued = Vec::new();
    for (driver, distance_km) in presence.available_within(ride.pickup, radius) {
        if queue.contains(driver) {
            continue;
        }
        queue.add_candidate(driver, distance_km, now_ms);
        enqueued.push((driver, distance_km));
    }

    debug!(ride = ?ride.id, timing = ?ride.timing, radius_km, enqueued = enqueued.len(), "match pass");
    if enqueued.is_empty() {
        MatchOutcome::NoCandidates
    } else {
        MatchOutcome::Enqueued(enqueued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{RideId, RideStatus};
    use crate::geo::Coordinates;

    const BASE: Coordinates = Coordinates { lat: 52.52, lng: 13.405 };

    fn coords_km_east(km: f64) -> Coordinates {
        Coordinates::new(BASE.lat, BASE.lng + km / (111.32 * BASE.lat.to_radians().cos()))
    }

    fn ride(timing: RideTiming) -> Ride {
        Ride {
            id: RideId(1),
            status: RideStatus::Pending,
            pickup: BASE,
            dropoff: coords_km_east(4.0),
            timing,
            scheduled_at_ms: None,
            estimated_cost: 10.0,
            driver: None,
            requested_at_ms: 0,
            cancel_reason: None,
        }
    }

    #[test]
    fn instant_ride_filters_by_radius() {
        let mut presence = PresenceStore::new();
        presence.set_online(DriverId(1), coords_km_east(2.0), 0).expect("d1");
        presence.set_online(DriverId(2), coords_km_east(8.0), 0).expect("d2");

        let mut queue = AcceptanceQueue::default();
        let outcome =
            match_and_enqueue(&ride(RideTiming::Instant), &mut queue, &presence, 5.0, 0);

        match outcome {
            MatchOutcome::Enqueued(candidates) => {
                assert_eq!(candidates.len(), 1);
                assert_eq!(candidates[0].0, DriverId(1));
            }
            other => panic!("expected one candidate, got {other:?}"),
        }
        assert!(queue.contains(DriverId(1)));
        assert!(!queue.contains(DriverId(2)));
    }

    #[test]
    fn scheduled_ride_ignores_distance() {
        let mut presence = PresenceStore::new();
        presence.set_online(DriverId(1), coords_km_east(2.0), 0).expect("d1");
        presence.set_online(DriverId(2), coords_km_east(40.0), 0).expect("d2");

        let mut queue = AcceptanceQueue::default();
        let outcome =
            match_and_enqueue(&ride(RideTiming::Scheduled), &mut queue, &presence, 5.0, 0);

        assert!(matches!(outcome, MatchOutcome::Enqueued(ref c) if c.len() == 2));
        assert!(queue.contains(DriverId(2)));
    }

    #[test]
    fn entry_distance_is_precomputed() {
        let mut presence = PresenceStore::new();
        presence.set_online(DriverId(1), coords_km_east(3.0), 0).expect("d1");

        let mut queue = AcceptanceQueue::default();
        match_and_enqueue(&ride(RideTiming::Instant), &mut queue, &presence, 5.0, 0);

        let entry = queue.entry(DriverId(1)).expect("entry");
        assert!((entry.distance_to_pickup_km - 3.0).abs() < 0.1);
    }

    #[test]
    fn rematch_does_not_duplicate_entries() {
        let mut presence = PresenceStore::new();
        presence.set_online(DriverId(1), coords_km_east(1.0), 0).expect("d1");

        let mut queue = AcceptanceQueue::default();
        let ride = ride(RideTiming::Instant);
        match_and_enqueue(&ride, &mut queue, &presence, 5.0, 0);
        let second = match_and_enqueue(&ride, &mut queue, &presence, 5.0, 60_000);

        assert_eq!(second, MatchOutcome::NoCandidates);
        assert_eq!(queue.entries().len(), 1);
    }

    #[test]
    fn empty_pool_yields_no_candidates() {
        let presence = PresenceStore::new();
        let mut queue = AcceptanceQueue::default();
        let outcome =
            match_and_enqueue(&ride(RideTiming::Instant), &mut queue, &presence, 5.0, 0);
        assert_eq!(outcome, MatchOutcome::NoCandidates);
        assert!(queue.entries().is_empty());
    }
}
