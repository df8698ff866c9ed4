//! Geographic primitives: coordinates, Haversine distance, and H3 cell covers.
//!
//! This module provides:
//!
//! - **Coordinates**: plain lat/lng pairs used across the public API
//! - **Distance calculation**: great-circle distance between two coordinates
//! - **Cell covers**: H3 grid disks that over-approximate a radius, cached
//!
//! Default H3 resolution is 9 (~240m cell size), suitable for city-scale
//! proximity queries.

use std::num::NonZeroUsize;
use std::sync::{Mutex, OnceLock};

use h3o::{CellIndex, LatLng, Resolution};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Great-circle distance in kilometers (Haversine).
pub fn distance_km(a: Coordinates, b: Coordinates) -> f64 {
    let (lat1, lon1) = (a.lat.to_radians(), a.lng.to_radians());
    let (lat2, lon2) = (b.lat.to_radians(), b.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlon = (dlon * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// H3 resolution used for the presence cell index.
pub const INDEX_RESOLUTION: Resolution = Resolution::Nine;

/// Conservative per-ring distance gain at [INDEX_RESOLUTION] (km). A disk of
/// `k = ceil(radius / RING_SPACING_KM)` rings always covers the radius, so the
/// exact Haversine filter applied afterwards never misses a candidate.
const RING_SPACING_KM: f64 = 0.2;

/// Convert coordinates to an H3 cell at the index resolution.
pub fn cell_for(coords: Coordinates) -> Result<CellIndex, DispatchError> {
    LatLng::new(coords.lat, coords.lng)
        .map(|ll| ll.to_cell(INDEX_RESOLUTION))
        .map_err(|_| DispatchError::InvalidCoordinates {
            lat: coords.lat,
            lng: coords.lng,
        })
}

/// Grid-disk cover cache. Radius queries repeat the same origin cell while a
/// driver or pickup point sits still, so the cover is worth caching.
struct CoverCache {
    cache: Mutex<LruCache<(CellIndex, u32), Vec<CellIndex>>>,
}

impl CoverCache {
    fn new() -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(1_000).expect("cache size must be non-zero"),
            )),
        }
    }

    fn get_or_compute(&self, origin: CellIndex, k: u32) -> Vec<CellIndex> {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(_) => return origin.grid_disk::<Vec<_>>(k), // Fallback: compute without cache if mutex poisoned
        };
        cache
            .get_or_insert((origin, k), || origin.grid_disk::<Vec<_>>(k))
            .clone()
    }
}

static COVER_CACHE: OnceLock<CoverCache> = OnceLock::new();

fn get_cover_cache() -> &'static CoverCache {
    COVER_CACHE.get_or_init(CoverCache::new)
}

/// Cells whose union covers every point within `radius_km` of `origin`.
/// Over-approximates; callers apply the exact distance filter on top.
pub fn cells_covering_radius(origin: CellIndex, radius_km: f64) -> Vec<CellIndex> {
    let k = (radius_km / RING_SPACING_KM).ceil().max(1.0) as u32;
    get_cover_cache().get_or_compute(origin, k)
}
