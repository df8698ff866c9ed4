//! Pending-ride timeout: a ride that is still pending when its horizon
//! elapses, with nobody left deciding, is cancelled with `NoDriverAvailable`,
//! expiring any remaining entries in the same transaction.
//!
//! While the queue still holds `viewing`/`interested` entries the horizon is
//! pushed out instead: a candidate mid-decision must not have the ride
//! cancelled under them.

use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::debug;

use crate::broadcast::{Notification, NotificationHub};
use crate::clock::{CurrentEvent, DispatchClock, EventKind, EventSubject};
use crate::config::DispatchConfig;
use crate::ecs::{CancelReason, QueueEntryStatus, Ride, RideIndex, RideStatus};
use crate::lifecycle;
use crate::queue::AcceptanceQueue;

pub fn ride_timeout_system(
    mut clock: ResMut<DispatchClock>,
    event: Res<CurrentEvent>,
    config: Res<DispatchConfig>,
    index: Res<RideIndex>,
    mut hub: ResMut<NotificationHub>,
    mut rides: Query<(&mut Ride, &mut AcceptanceQueue)>,
) {
    if event.0.kind != EventKind::PendingRideTimeout {
        return;
    }
    let Some(EventSubject::Ride(ride_id)) = event.0.subject else {
        return;
    };
    let Some(entity) = index.get(ride_id) else {
        return;
    };
    let Ok((mut ride, mut queue)) = rides.get_mut(entity) else {
        return;
    };
    if ride.status != RideStatus::Pending {
        return;
    }
    if queue.has_active() {
        debug!(ride = ?ride_id, "timeout deferred, candidates still deciding");
        clock.schedule_in(
            config.pending_timeout_ms,
            EventKind::PendingRideTimeout,
            Some(EventSubject::Ride(ride_id)),
        );
        return;
    }

    let now = clock.now();
    let Ok(Some(commit)) =
        lifecycle::cancel(&mut ride, &mut queue, CancelReason::NoDriverAvailable, now)
    else {
        return;
    };

    // Entry expiry is published before the ride transition so no subscriber
    // sees an accepted-looking queue on a cancelled ride.
    for driver in commit.expired {
        hub.publish(Notification::QueueEntryChanged {
            ride: ride_id,
            driver,
            status: QueueEntryStatus::Expired,
            at_ms: now,
        });
    }
    hub.publish(Notification::RideStatusChanged {
        ride: ride_id,
        status: RideStatus::Cancelled,
        driver: None,
        at_ms: now,
    });
}
