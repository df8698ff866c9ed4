#![allow(dead_code)]

use dispatch_core::broadcast::Notification;
use dispatch_core::config::DispatchConfig;
use dispatch_core::dispatch::Dispatch;

/// Short horizons so tests advance seconds instead of minutes.
pub fn fast_config() -> DispatchConfig {
    DispatchConfig::default()
        .with_refresh_interval_secs(30)
        .with_pending_timeout_secs(120)
        .with_rematch_interval_secs(15)
}

/// The full audit log as bare notifications, in publish order.
pub fn published(dispatch: &Dispatch) -> Vec<Notification> {
    dispatch
        .notifications()
        .iter()
        .map(|envelope| envelope.event)
        .collect()
}
