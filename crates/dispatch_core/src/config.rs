use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::clock::{ONE_MIN_MS, ONE_SEC_MS};

/// Proximity radius for instant rides (km).
const DEFAULT_INSTANT_RADIUS_KM: f64 = 5.0;

/// Presence refresh interval while a driver is online.
const DEFAULT_REFRESH_INTERVAL_MS: u64 = 30 * ONE_SEC_MS;

/// Horizon after which an unmatched pending ride is cancelled.
const DEFAULT_PENDING_TIMEOUT_MS: u64 = 10 * ONE_MIN_MS;

/// Interval between re-match sweeps for a stalled pending ride.
const DEFAULT_REMATCH_INTERVAL_MS: u64 = ONE_MIN_MS;

/// Dispatch tuning knobs. Insert as a resource; all values have defaults so
/// callers only override what they need.
#[derive(Debug, Clone, Copy, Resource, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Max pickup distance (km) for instant-ride candidates.
    pub instant_radius_km: f64,
    /// How often an online driver's location is resampled (ms).
    pub presence_refresh_interval_ms: u64,
    /// A pending ride older than this, with no candidate still deciding, is
    /// cancelled with NoDriverAvailable (ms).
    pub pending_timeout_ms: u64,
    /// Delay between re-match sweeps while a pending ride has no active entries (ms).
    pub rematch_interval_ms: u64,
    /// Radius multiplier applied per re-match attempt for instant rides.
    pub rematch_radius_growth: f64,
    /// Consecutive failed location samples before a driver is set offline.
    pub max_missed_refreshes: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            instant_radius_km: DEFAULT_INSTANT_RADIUS_KM,
            presence_refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            pending_timeout_ms: DEFAULT_PENDING_TIMEOUT_MS,
            rematch_interval_ms: DEFAULT_REMATCH_INTERVAL_MS,
            rematch_radius_growth: 1.5,
            max_missed_refreshes: 3,
        }
    }
}

impl DispatchConfig {
    pub fn with_instant_radius_km(mut self, radius_km: f64) -> Self {
        self.instant_radius_km = radius_km;
        self
    }

    pub fn with_refresh_interval_secs(mut self, secs: u64) -> Self {
        self.presence_refresh_interval_ms = secs * ONE_SEC_MS;
        self
    }

    pub fn with_pending_timeout_secs(mut self, secs: u64) -> Self {
        self.pending_timeout_ms = secs * ONE_SEC_MS;
        self
    }

    pub fn with_rematch_interval_secs(mut self, secs: u64) -> Self {
        self.rematch_interval_ms = secs * ONE_SEC_MS;
        self
    }

    pub fn with_rematch_radius_growth(mut self, growth: f64) -> Self {
        self.rematch_radius_growth = growth;
        self
    }

    pub fn with_max_missed_refreshes(mut self, count: u32) -> Self {
        self.max_missed_refreshes = count;
        self
    }

    /// Radius (km) used for an instant-ride match on the given attempt.
    /// Attempt 0 is the initial match at submission.
    pub fn radius_for_attempt(&self, attempt: u32) -> f64 {
        self.instant_radius_km * self.rematch_radius_growth.powi(attempt as i32)
    }
}
