//! Re-match sweep: retry matching for a pending ride whose queue has gone
//! quiet, widening the radius per attempt for instant rides.
//!
//! A sweep chain starts when the initial match finds nobody or a decline
//! leaves a pending ride with no active entries. The chain stops once the
//! ride leaves pending or once a sweep produces candidates; a later decline
//! starts a fresh chain. The pending-ride timeout bounds how long sweeps can
//! keep trying.

use bevy_ecs::prelude::{Query, Res, ResMut};

use crate::broadcast::{Notification, NotificationHub};
use crate::clock::{CurrentEvent, DispatchClock, EventKind, EventSubject};
use crate::config::DispatchConfig;
use crate::ecs::{RematchState, Ride, RideIndex, RideStatus};
use crate::matcher::{self, MatchOutcome};
use crate::presence::PresenceStore;
use crate::queue::AcceptanceQueue;

pub fn rematch_system(
    mut clock: ResMut<DispatchClock>,
    event: Res<CurrentEvent>,
    config: Res<DispatchConfig>,
    index: Res<RideIndex>,
    presence: Res<PresenceStore>,
    mut hub: ResMut<NotificationHub>,
    mut rides: Query<(&Ride, &mut AcceptanceQueue, &mut RematchState)>,
) {
    if event.0.kind != EventKind::RematchSweep {
        return;
    }
    let Some(EventSubject::Ride(ride_id)) = event.0.subject else {
        return;
    };
    let Some(entity) = index.get(ride_id) else {
        return;
    };
    let Ok((ride, mut queue, mut rematch)) = rides.get_mut(entity) else {
        return;
    };
    if ride.status != RideStatus::Pending {
        return;
    }
    if queue.has_active() {
        // Candidates are still deciding; a decline retriggers the sweep.
        return;
    }

    rematch.attempts += 1;
    let radius_km = config.radius_for_attempt(rematch.attempts);
    let now = clock.now();
    match matcher::match_and_enqueue(ride, &mut queue, &presence, radius_km, now) {
        MatchOutcome::Enqueued(candidates) => {
            for (driver, distance_km) in candidates {
                hub.publish(Notification::QueueOpportunity {
                    ride: ride_id,
                    driver,
                    distance_to_pickup_km: distance_km,
                    at_ms: now,
                });
            }
        }
        MatchOutcome::NoCandidates => {
            clock.schedule_in(
                config.rematch_interval_ms,
                EventKind::RematchSweep,
                Some(EventSubject::Ride(ride_id)),
            );
        }
    }
}
