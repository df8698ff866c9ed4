//! The dispatch facade: single writer over all ride, queue and presence
//! state.
//!
//! Every inbound operation executes synchronously against the owned world
//! and returns a typed result, so concurrent driver/rider actions resolve to
//! a serialized commit order and the accept/cancel compare-and-set can never
//! interleave. Time-driven behavior (refresh ticks, timeouts, re-match
//! sweeps) sits on the event clock; call [Dispatch::advance_to] or
//! [Dispatch::advance_by] to process it.
//!
//! Notifications are published only after the corresponding state is
//! committed, and queue-entry expiry is always published before the ride
//! transition that caused it, so a subscriber never learns "ride accepted"
//! while a sibling entry still looks live.

use std::sync::mpsc::Receiver;

use bevy_ecs::prelude::World;
use bevy_ecs::schedule::Schedule;
use tracing::{debug, info};

use crate::broadcast::{Envelope, Notification, NotificationHub};
use crate::clock::{DispatchClock, EventKind, EventSubject};
use crate::config::DispatchConfig;
use crate::ecs::{
    CancelReason, DriverId, QueueEntry, QueueEntryStatus, RematchState, Ride, RideId, RideIndex,
    RideStatus, RideTiming,
};
use crate::error::DispatchError;
use crate::geo::{self, Coordinates};
use crate::lifecycle::{self, AcceptOutcome};
use crate::location::{LocationSource, LocationSourceResource};
use crate::matcher::{self, MatchOutcome};
use crate::presence::{DriverPresence, PresenceStore};
use crate::queue::{AcceptanceQueue, Applied};
use crate::runner::{self, dispatch_schedule};
use crate::systems::presence_refresh::RefreshRoster;

/// A ride submission. Fare and route are supplied by collaborators; the
/// core only dispatches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RideRequest {
    pub pickup: Coordinates,
    pub dropoff: Coordinates,
    pub timing: RideTiming,
    pub scheduled_at_ms: Option<u64>,
    pub estimated_cost: f64,
}

impl RideRequest {
    pub fn instant(pickup: Coordinates, dropoff: Coordinates, estimated_cost: f64) -> Self {
        Self {
            pickup,
            dropoff,
            timing: RideTiming::Instant,
            scheduled_at_ms: None,
            estimated_cost,
        }
    }

    pub fn scheduled(
        pickup: Coordinates,
        dropoff: Coordinates,
        scheduled_at_ms: u64,
        estimated_cost: f64,
    ) -> Self {
        Self {
            pickup,
            dropoff,
            timing: RideTiming::Scheduled,
            scheduled_at_ms: Some(scheduled_at_ms),
            estimated_cost,
        }
    }
}

pub struct Dispatch {
    world: World,
    schedule: Schedule,
    next_ride_id: u64,
}

impl Dispatch {
    pub fn new(config: DispatchConfig, location: Box<dyn LocationSource>) -> Self {
        let mut world = World::new();
        world.insert_resource(config);
        world.insert_resource(DispatchClock::default());
        world.insert_resource(PresenceStore::default());
        world.insert_resource(NotificationHub::default());
        world.insert_resource(RideIndex::default());
        world.insert_resource(RefreshRoster::default());
        world.insert_resource(LocationSourceResource(location));
        Self {
            world,
            schedule: dispatch_schedule(),
            next_ride_id: 1,
        }
    }

    pub fn now(&self) -> u64 {
        self.world.resource::<DispatchClock>().now()
    }

    /// Processes every clock event due at or before `timestamp_ms`, then
    /// settles the clock there. Returns the number of events processed.
    pub fn advance_to(&mut self, timestamp_ms: u64) -> usize {
        runner::run_due_events(&mut self.world, &mut self.schedule, timestamp_ms)
    }

    pub fn advance_by(&mut self, delta_ms: u64) -> usize {
        self.advance_to(self.now() + delta_ms)
    }

    pub fn subscribe(&mut self) -> Receiver<Envelope> {
        self.world.resource_mut::<NotificationHub>().subscribe()
    }

    /// Audit log of everything published so far, in publish order.
    pub fn notifications(&self) -> &[Envelope] {
        self.world.resource::<NotificationHub>().published()
    }

    // ------------------------------------------------------------------
    // Presence
    // ------------------------------------------------------------------

    pub fn driver_go_online(
        &mut self,
        driver: DriverId,
        coords: Coordinates,
    ) -> Result<(), DispatchError> {
        let now = self.now();
        let updated = self
            .world
            .resource_mut::<PresenceStore>()
            .set_online(driver, coords, now)?;
        self.publish_presence(&updated, now);
        info!(?driver, "driver online");

        if self.world.resource_mut::<RefreshRoster>().begin(driver) {
            let interval = self
                .world
                .resource::<DispatchConfig>()
                .presence_refresh_interval_ms;
            self.world.resource_mut::<DispatchClock>().schedule_in(
                interval,
                EventKind::PresenceRefreshTick,
                Some(EventSubject::Driver(driver)),
            );
        }
        Ok(())
    }

    pub fn driver_go_offline(&mut self, driver: DriverId) -> Result<(), DispatchError> {
        let now = self.now();
        let updated = self
            .world
            .resource_mut::<PresenceStore>()
            .set_offline(driver, now)?;
        self.publish_presence(&updated, now);
        info!(?driver, "driver offline");
        Ok(())
    }

    /// Client-pushed coordinate update; valid only while online.
    pub fn update_driver_coordinates(
        &mut self,
        driver: DriverId,
        coords: Coordinates,
    ) -> Result<(), DispatchError> {
        let now = self.now();
        let updated = self
            .world
            .resource_mut::<PresenceStore>()
            .update_coordinates(driver, coords, now)?;
        self.publish_presence(&updated, now);
        Ok(())
    }

    pub fn presence(&self, driver: DriverId) -> Option<DriverPresence> {
        self.world.resource::<PresenceStore>().get(driver).copied()
    }

    // ------------------------------------------------------------------
    // Rides
    // ------------------------------------------------------------------

    pub fn submit_ride_request(&mut self, request: RideRequest) -> Result<RideId, DispatchError> {
        geo::cell_for(request.pickup)?;
        geo::cell_for(request.dropoff)?;

        let now = self.now();
        let id = RideId(self.next_ride_id);
        self.next_ride_id += 1;
        let ride = Ride {
            id,
            status: RideStatus::Pending,
            pickup: request.pickup,
            dropoff: request.dropoff,
            timing: request.timing,
            scheduled_at_ms: request.scheduled_at_ms,
            estimated_cost: request.estimated_cost,
            driver: None,
            requested_at_ms: now,
            cancel_reason: None,
        };
        let entity = self
            .world
            .spawn((ride, AcceptanceQueue::default(), RematchState::default()))
            .id();
        self.world.resource_mut::<RideIndex>().insert(id, entity);
        info!(ride = ?id, timing = ?request.timing, "ride submitted");
        self.publish(Notification::RideStatusChanged {
            ride: id,
            status: RideStatus::Pending,
            driver: None,
            at_ms: now,
        });

        let config = *self.world.resource::<DispatchConfig>();
        let outcome = self
            .world
            .resource_scope::<PresenceStore, _>(|world, presence| {
                let mut queue = world
                    .get_mut::<AcceptanceQueue>(entity)
                    .expect("queue spawned above");
                matcher::match_and_enqueue(
                    &ride,
                    &mut queue,
                    &presence,
                    config.radius_for_attempt(0),
                    now,
                )
            });
        match outcome {
            MatchOutcome::Enqueued(candidates) => {
                for (driver, distance_km) in candidates {
                    self.publish(Notification::QueueOpportunity {
                        ride: id,
                        driver,
                        distance_to_pickup_km: distance_km,
                        at_ms: now,
                    });
                }
            }
            MatchOutcome::NoCandidates => {
                self.world.resource_mut::<DispatchClock>().schedule_in(
                    config.rematch_interval_ms,
                    EventKind::RematchSweep,
                    Some(EventSubject::Ride(id)),
                );
            }
        }
        self.world.resource_mut::<DispatchClock>().schedule_in(
            config.pending_timeout_ms,
            EventKind::PendingRideTimeout,
            Some(EventSubject::Ride(id)),
        );
        Ok(id)
    }

    pub fn ride(&self, ride: RideId) -> Option<Ride> {
        let entity = self.world.resource::<RideIndex>().get(ride)?;
        self.world.get::<Ride>(entity).copied()
    }

    pub fn queue_entries(&self, ride: RideId) -> Vec<QueueEntry> {
        self.world
            .resource::<RideIndex>()
            .get(ride)
            .and_then(|entity| self.world.get::<AcceptanceQueue>(entity))
            .map(|queue| queue.entries().to_vec())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Driver actions on the queue
    // ------------------------------------------------------------------

    pub fn express_interest(
        &mut self,
        ride: RideId,
        driver: DriverId,
    ) -> Result<(), DispatchError> {
        let entity = self.ride_entity(ride)?;
        let now = self.now();
        let applied = self
            .world
            .get_mut::<AcceptanceQueue>(entity)
            .ok_or(DispatchError::UnknownRide(ride))?
            .express_interest(ride, driver)?;
        if applied == Applied::Changed {
            self.publish(Notification::QueueEntryChanged {
                ride,
                driver,
                status: QueueEntryStatus::Interested,
                at_ms: now,
            });
        }
        Ok(())
    }

    pub fn decline(&mut self, ride: RideId, driver: DriverId) -> Result<(), DispatchError> {
        let entity = self.ride_entity(ride)?;
        let now = self.now();
        let applied = self
            .world
            .get_mut::<AcceptanceQueue>(entity)
            .ok_or(DispatchError::UnknownRide(ride))?
            .decline(ride, driver, now)?;
        if applied == Applied::NoOp {
            return Ok(());
        }
        self.publish(Notification::QueueEntryChanged {
            ride,
            driver,
            status: QueueEntryStatus::Declined,
            at_ms: now,
        });

        // Last active candidate walked away: queue a re-match sweep.
        let stalled = self
            .world
            .get::<Ride>(entity)
            .is_some_and(|r| r.status == RideStatus::Pending)
            && self
                .world
                .get::<AcceptanceQueue>(entity)
                .is_some_and(|q| !q.has_active());
        if stalled {
            let interval = self.world.resource::<DispatchConfig>().rematch_interval_ms;
            self.world.resource_mut::<DispatchClock>().schedule_in(
                interval,
                EventKind::RematchSweep,
                Some(EventSubject::Ride(ride)),
            );
        }
        Ok(())
    }

    /// Tries to commit `driver` as the ride's assignee. Losing the race is
    /// the `AlreadyTaken` outcome, not an error.
    pub fn accept(
        &mut self,
        ride: RideId,
        driver: DriverId,
    ) -> Result<AcceptOutcome, DispatchError> {
        let entity = self.ride_entity(ride)?;
        let now = self.now();
        let outcome = {
            let mut query = self.world.query::<(&mut Ride, &mut AcceptanceQueue)>();
            let (mut ride_row, mut queue) = query
                .get_mut(&mut self.world, entity)
                .map_err(|_| DispatchError::UnknownRide(ride))?;
            lifecycle::commit_accept(&mut ride_row, &mut queue, driver, now)?
        };

        // Only a fresh commit publishes; a repeated accept changed nothing.
        if let AcceptOutcome::Committed { expired } = &outcome {
            self.publish(Notification::QueueEntryChanged {
                ride,
                driver,
                status: QueueEntryStatus::Accepted,
                at_ms: now,
            });
            for loser in expired {
                self.publish(Notification::QueueEntryChanged {
                    ride,
                    driver: *loser,
                    status: QueueEntryStatus::Expired,
                    at_ms: now,
                });
            }
            self.publish(Notification::RideStatusChanged {
                ride,
                status: RideStatus::Accepted,
                driver: Some(driver),
                at_ms: now,
            });
            self.set_driver_available(driver, false, now);
        }
        Ok(outcome)
    }

    /// Rider-requested cancellation. Atomically expires all active entries;
    /// an in-flight accept arriving after this commits observes a
    /// non-pending ride.
    pub fn cancel_ride(&mut self, ride: RideId) -> Result<(), DispatchError> {
        let entity = self.ride_entity(ride)?;
        let now = self.now();
        let commit = {
            let mut query = self.world.query::<(&mut Ride, &mut AcceptanceQueue)>();
            let (mut ride_row, mut queue) = query
                .get_mut(&mut self.world, entity)
                .map_err(|_| DispatchError::UnknownRide(ride))?;
            lifecycle::cancel(&mut ride_row, &mut queue, CancelReason::RiderRequested, now)?
        };

        if let Some(commit) = commit {
            for loser in &commit.expired {
                self.publish(Notification::QueueEntryChanged {
                    ride,
                    driver: *loser,
                    status: QueueEntryStatus::Expired,
                    at_ms: now,
                });
            }
            self.publish(Notification::RideStatusChanged {
                ride,
                status: RideStatus::Cancelled,
                driver: None,
                at_ms: now,
            });
            if let Some(released) = commit.released {
                self.set_driver_available(released, true, now);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ride-execution signals (from the trip-execution collaborator)
    // ------------------------------------------------------------------

    pub fn start_trip(&mut self, ride: RideId) -> Result<(), DispatchError> {
        let entity = self.ride_entity(ride)?;
        let now = self.now();
        let driver = {
            let mut ride_row = self
                .world
                .get_mut::<Ride>(entity)
                .ok_or(DispatchError::UnknownRide(ride))?;
            lifecycle::start_trip(&mut ride_row)?;
            ride_row.driver
        };
        self.publish(Notification::RideStatusChanged {
            ride,
            status: RideStatus::InProgress,
            driver,
            at_ms: now,
        });
        Ok(())
    }

    pub fn complete_trip(&mut self, ride: RideId) -> Result<(), DispatchError> {
        let entity = self.ride_entity(ride)?;
        let now = self.now();
        let driver = {
            let mut ride_row = self
                .world
                .get_mut::<Ride>(entity)
                .ok_or(DispatchError::UnknownRide(ride))?;
            lifecycle::complete_trip(&mut ride_row)?;
            ride_row.driver
        };
        self.publish(Notification::RideStatusChanged {
            ride,
            status: RideStatus::Completed,
            driver,
            at_ms: now,
        });
        if let Some(driver) = driver {
            self.set_driver_available(driver, true, now);
        }
        Ok(())
    }

    // ------------------------------------------------------------------

    fn ride_entity(&self, ride: RideId) -> Result<bevy_ecs::entity::Entity, DispatchError> {
        self.world
            .resource::<RideIndex>()
            .get(ride)
            .ok_or(DispatchError::UnknownRide(ride))
    }

    fn publish(&mut self, event: Notification) {
        self.world.resource_mut::<NotificationHub>().publish(event);
    }

    fn publish_presence(&mut self, record: &DriverPresence, at_ms: u64) {
        self.publish(Notification::Presence {
            driver: record.driver,
            online: record.online,
            available: record.available,
            coordinates: record.coordinates,
            at_ms,
        });
    }

    fn set_driver_available(&mut self, driver: DriverId, available: bool, now: u64) {
        match self
            .world
            .resource_mut::<PresenceStore>()
            .set_available(driver, available, now)
        {
            Ok(updated) => self.publish_presence(&updated, now),
            // The driver dropped offline in the meantime; nothing to update.
            Err(err) => debug!(?driver, %err, "availability toggle skipped"),
        }
    }
}
