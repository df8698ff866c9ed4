//! Presence refresh: while a driver is online, resample their location on a
//! fixed interval and republish it.
//!
//! Each online driver carries one self-rescheduling tick chain. The chain
//! dies as soon as the driver is found offline at tick time, so refreshes
//! stop within one interval of going offline. A failed sample keeps the
//! previous coordinates and is only logged; after `max_missed_refreshes`
//! consecutive failures the driver is set offline.

use std::collections::HashSet;

use bevy_ecs::prelude::{Res, ResMut, Resource};
use tracing::{info, warn};

use crate::broadcast::{Notification, NotificationHub};
use crate::clock::{CurrentEvent, DispatchClock, EventKind, EventSubject};
use crate::config::DispatchConfig;
use crate::ecs::DriverId;
use crate::location::LocationSourceResource;
use crate::presence::PresenceStore;

/// Drivers with a live tick chain. Going online starts a chain only if none
/// is live, so an offline/online flip within one interval cannot fork two
/// chains for the same driver.
#[derive(Debug, Default, Resource)]
pub struct RefreshRoster {
    ticking: HashSet<DriverId>,
}

impl RefreshRoster {
    /// Returns `true` if the driver was not already ticking.
    pub fn begin(&mut self, driver: DriverId) -> bool {
        self.ticking.insert(driver)
    }

    pub fn end(&mut self, driver: DriverId) {
        self.ticking.remove(&driver);
    }

    pub fn is_ticking(&self, driver: DriverId) -> bool {
        self.ticking.contains(&driver)
    }
}

pub fn presence_refresh_system(
    mut clock: ResMut<DispatchClock>,
    event: Res<CurrentEvent>,
    config: Res<DispatchConfig>,
    mut roster: ResMut<RefreshRoster>,
    mut presence: ResMut<PresenceStore>,
    mut source: ResMut<LocationSourceResource>,
    mut hub: ResMut<NotificationHub>,
) {
    if event.0.kind != EventKind::PresenceRefreshTick {
        return;
    }
    let Some(EventSubject::Driver(driver)) = event.0.subject else {
        return;
    };

    let online = presence.get(driver).is_some_and(|r| r.online);
    if !online {
        roster.end(driver);
        return;
    }

    let now = clock.now();
    match source.0.sample(driver) {
        Ok(coords) => match presence.update_coordinates(driver, coords, now) {
            Ok(updated) => hub.publish(Notification::Presence {
                driver,
                online: updated.online,
                available: updated.available,
                coordinates: updated.coordinates,
                at_ms: now,
            }),
            Err(err) => {
                // Bad sample (e.g. out-of-range fix); previous coordinates stand.
                warn!(?driver, %err, "refresh sample rejected");
            }
        },
        Err(err) => {
            warn!(?driver, %err, "location sample failed, retaining previous coordinates");
            let missed = presence.note_missed_refresh(driver).unwrap_or(0);
            if missed >= config.max_missed_refreshes {
                if let Ok(updated) = presence.set_offline(driver, now) {
                    info!(?driver, missed, "driver set offline after missed refreshes");
                    hub.publish(Notification::Presence {
                        driver,
                        online: false,
                        available: false,
                        coordinates: updated.coordinates,
                        at_ms: now,
                    });
                }
                roster.end(driver);
                return;
            }
        }
    }

    clock.schedule_in(
        config.presence_refresh_interval_ms,
        EventKind::PresenceRefreshTick,
        Some(EventSubject::Driver(driver)),
    );
}
