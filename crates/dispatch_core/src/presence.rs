//! Presence store: authoritative record of driver online/availability state
//! and last known coordinates.
//!
//! Drivers that are online *and* available are additionally indexed by H3
//! cell so radius queries scan a grid-disk cover instead of every record.
//! The index is updated incrementally on every mutation; the invariant is
//! that a driver is indexed if and only if `online && available`.

use std::collections::HashMap;

use bevy_ecs::prelude::Resource;
use h3o::CellIndex;

use crate::ecs::DriverId;
use crate::error::DispatchError;
use crate::geo::{self, Coordinates};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverPresence {
    pub driver: DriverId,
    pub online: bool,
    /// Free to take a ride. Implies `online`.
    pub available: bool,
    pub coordinates: Coordinates,
    pub last_updated_ms: u64,
    /// Consecutive failed location samples since the last success.
    pub missed_refreshes: u32,
}

#[derive(Debug, Default, Resource)]
pub struct PresenceStore {
    records: HashMap<DriverId, DriverPresence>,
    available_by_cell: HashMap<CellIndex, Vec<DriverId>>,
    cell_of: HashMap<DriverId, CellIndex>,
}

impl PresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, driver: DriverId) -> Option<&DriverPresence> {
        self.records.get(&driver)
    }

    /// Marks the driver online and available at `coords`. Creates the record
    /// on first report. Idempotent.
    pub fn set_online(
        &mut self,
        driver: DriverId,
        coords: Coordinates,
        now_ms: u64,
    ) -> Result<DriverPresence, DispatchError> {
        let cell = geo::cell_for(coords)?;
        let record = self
            .records
            .entry(driver)
            .or_insert_with(|| DriverPresence {
                driver,
                online: false,
                available: false,
                coordinates: coords,
                last_updated_ms: now_ms,
                missed_refreshes: 0,
            });
        record.online = true;
        record.available = true;
        record.coordinates = coords;
        record.last_updated_ms = now_ms;
        record.missed_refreshes = 0;
        let updated = *record;
        self.index_at(driver, cell);
        Ok(updated)
    }

    /// Marks the driver offline and unavailable. Historical coordinates are
    /// retained. Idempotent.
    pub fn set_offline(
        &mut self,
        driver: DriverId,
        now_ms: u64,
    ) -> Result<DriverPresence, DispatchError> {
        let record = self
            .records
            .get_mut(&driver)
            .ok_or(DispatchError::UnknownDriver(driver))?;
        record.online = false;
        record.available = false;
        record.last_updated_ms = now_ms;
        let updated = *record;
        self.unindex(driver);
        Ok(updated)
    }

    /// Updates coordinates for an online driver; fails with `NotOnline`
    /// otherwise.
    pub fn update_coordinates(
        &mut self,
        driver: DriverId,
        coords: Coordinates,
        now_ms: u64,
    ) -> Result<DriverPresence, DispatchError> {
        let cell = geo::cell_for(coords)?;
        let record = self
            .records
            .get_mut(&driver)
            .filter(|r| r.online)
            .ok_or(DispatchError::NotOnline(driver))?;
        record.coordinates = coords;
        record.last_updated_ms = now_ms;
        record.missed_refreshes = 0;
        let available = record.available;
        let updated = *record;
        if available {
            self.index_at(driver, cell);
        }
        Ok(updated)
    }

    /// Toggles availability for an online driver (e.g. committed to a ride).
    pub fn set_available(
        &mut self,
        driver: DriverId,
        available: bool,
        now_ms: u64,
    ) -> Result<DriverPresence, DispatchError> {
        let record = self
            .records
            .get_mut(&driver)
            .filter(|r| r.online)
            .ok_or(DispatchError::NotOnline(driver))?;
        record.available = available;
        record.last_updated_ms = now_ms;
        let coords = record.coordinates;
        let updated = *record;
        if available {
            // Coordinates were validated when they were stored.
            if let Ok(cell) = geo::cell_for(coords) {
                self.index_at(driver, cell);
            }
        } else {
            self.unindex(driver);
        }
        Ok(updated)
    }

    /// Records a failed location sample; returns the consecutive-miss count.
    pub fn note_missed_refresh(&mut self, driver: DriverId) -> Result<u32, DispatchError> {
        let record = self
            .records
            .get_mut(&driver)
            .filter(|r| r.online)
            .ok_or(DispatchError::NotOnline(driver))?;
        record.missed_refreshes = record.missed_refreshes.saturating_add(1);
        Ok(record.missed_refreshes)
    }

    /// Available drivers with their distance (km) to `center`. A radius of
    /// `Some(km)` filters by distance via the cell index; `None` returns the
    /// whole available pool (scheduled rides).
    pub fn available_within(
        &self,
        center: Coordinates,
        radius_km: Option<f64>,
    ) -> Vec<(DriverId, f64)> {
        match radius_km {
            None => self
                .records
                .values()
                .filter(|r| r.available)
                .map(|r| (r.driver, geo::distance_km(r.coordinates, center)))
                .collect(),
            Some(radius) => {
                let Ok(center_cell) = geo::cell_for(center) else {
                    // Unindexable center; fall back to a full scan.
                    return self
                        .records
                        .values()
                        .filter(|r| r.available)
                        .map(|r| (r.driver, geo::distance_km(r.coordinates, center)))
                        .filter(|(_, d)| *d <= radius)
                        .collect();
                };
                let mut out = Vec::new();
                for cell in geo::cells_covering_radius(center_cell, radius) {
                    let Some(drivers) = self.available_by_cell.get(&cell) else {
                        continue;
                    };
                    for driver in drivers {
                        let Some(record) = self.records.get(driver) else {
                            continue;
                        };
                        let d = geo::distance_km(record.coordinates, center);
                        if d <= radius {
                            out.push((*driver, d));
                        }
                    }
                }
                out
            }
        }
    }

    fn index_at(&mut self, driver: DriverId, cell: CellIndex) {
        if self.cell_of.get(&driver) == Some(&cell) {
            return;
        }
        self.unindex(driver);
        self.available_by_cell.entry(cell).or_default().push(driver);
        self.cell_of.insert(driver, cell);
    }

    fn unindex(&mut self, driver: DriverId) {
        if let Some(cell) = self.cell_of.remove(&driver) {
            if let Some(drivers) = self.available_by_cell.get_mut(&cell) {
                drivers.retain(|d| *d != driver);
                if drivers.is_empty() {
                    self.available_by_cell.remove(&cell);
                }
            }
        }
    }
}
