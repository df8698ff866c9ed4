//! Shared fixtures for tests and demos (behind the `test-helpers` feature).

use std::sync::{Arc, Mutex};

use crate::config::DispatchConfig;
use crate::dispatch::Dispatch;
use crate::ecs::DriverId;
use crate::geo::Coordinates;
use crate::location::{LocationSource, LocationUnavailable, StaticLocations};

/// Alexanderplatz, Berlin. All distance-based fixtures offset from here.
pub const BASE: Coordinates = Coordinates { lat: 52.52, lng: 13.405 };

/// Coordinates roughly `km` kilometers east of [BASE].
pub fn coords_km_east(km: f64) -> Coordinates {
    Coordinates::new(BASE.lat, BASE.lng + km / (111.32 * BASE.lat.to_radians().cos()))
}

/// Coordinates roughly `km` kilometers north of [BASE].
pub fn coords_km_north(km: f64) -> Coordinates {
    Coordinates::new(BASE.lat + km / 111.32, BASE.lng)
}

/// A [StaticLocations] source that stays mutable after the dispatcher takes
/// ownership of the boxed half, so tests can script sample results per tick.
#[derive(Clone, Default)]
pub struct SharedLocations {
    inner: Arc<Mutex<StaticLocations>>,
}

impl SharedLocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, driver: DriverId, coords: Coordinates) {
        self.inner.lock().expect("locations lock").set(driver, coords);
    }

    pub fn clear(&self, driver: DriverId) {
        self.inner.lock().expect("locations lock").clear(driver);
    }
}

impl LocationSource for SharedLocations {
    fn sample(&mut self, driver: DriverId) -> Result<Coordinates, LocationUnavailable> {
        self.inner.lock().expect("locations lock").sample(driver)
    }
}

/// A dispatcher over a [SharedLocations] source, plus the handle that keeps
/// feeding it coordinates.
pub fn test_dispatch(config: DispatchConfig) -> (Dispatch, SharedLocations) {
    let locations = SharedLocations::new();
    let dispatch = Dispatch::new(config, Box::new(locations.clone()));
    (dispatch, locations)
}

/// Puts `driver` online at `coords` and registers the same coordinates with
/// the location source so refresh ticks keep succeeding.
pub fn online_driver(
    dispatch: &mut Dispatch,
    locations: &SharedLocations,
    driver: DriverId,
    coords: Coordinates,
) {
    locations.set(driver, coords);
    dispatch
        .driver_go_online(driver, coords)
        .expect("driver online");
}
