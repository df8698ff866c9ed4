//! Geolocation sampling boundary.
//!
//! The refresh scheduler pulls driver coordinates through [LocationSource] so
//! the core never talks to hardware or a browser API directly. Failures are
//! expected (permission prompts, cold GPS) and surface as
//! [LocationUnavailable]; the caller decides what to retain.

use bevy_ecs::prelude::Resource;
use std::collections::HashMap;

use crate::ecs::DriverId;
use crate::geo::Coordinates;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("location unavailable for driver {0:?}")]
pub struct LocationUnavailable(pub DriverId);

pub trait LocationSource: Send + Sync {
    fn sample(&mut self, driver: DriverId) -> Result<Coordinates, LocationUnavailable>;
}

/// Resource wrapper so the sampling backend is swappable.
#[derive(Resource)]
pub struct LocationSourceResource(pub Box<dyn LocationSource>);

/// Simple in-memory source: returns whatever was last set per driver.
/// Drivers with no entry sample as unavailable. Useful for demos and tests.
#[derive(Debug, Default)]
pub struct StaticLocations {
    coords: HashMap<DriverId, Coordinates>,
}

impl StaticLocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, driver: DriverId, coords: Coordinates) {
        self.coords.insert(driver, coords);
    }

    pub fn clear(&mut self, driver: DriverId) {
        self.coords.remove(&driver);
    }
}

impl LocationSource for StaticLocations {
    fn sample(&mut self, driver: DriverId) -> Result<Coordinates, LocationUnavailable> {
        self.coords
            .get(&driver)
            .copied()
            .ok_or(LocationUnavailable(driver))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_source_returns_last_set_coordinates() {
        let mut source = StaticLocations::new();
        let driver = DriverId(3);
        assert_eq!(source.sample(driver), Err(LocationUnavailable(driver)));

        let coords = Coordinates::new(52.5, 13.4);
        source.set(driver, coords);
        assert_eq!(source.sample(driver), Ok(coords));

        source.clear(driver);
        assert_eq!(source.sample(driver), Err(LocationUnavailable(driver)));
    }
}
