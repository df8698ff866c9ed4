//! Per-ride acceptance queue: one entry per candidate driver, each with its
//! own state machine.
//!
//! Valid paths: `viewing → interested → accepted`, `viewing → declined`,
//! `interested → declined`, and any active entry can be swept to `expired`.
//! Terminal states (`accepted`, `declined`, `expired`) are never left.
//! Driver actions are idempotent against repeated identical calls.

use bevy_ecs::prelude::Component;
use tracing::warn;

use crate::ecs::{DriverId, QueueEntry, QueueEntryStatus, RideId};
use crate::error::DispatchError;

/// Whether an operation actually changed state (repeat calls are no-ops).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Changed,
    NoOp,
}

#[derive(Debug, Clone, Default, Component)]
pub struct AcceptanceQueue {
    entries: Vec<QueueEntry>,
}

impl AcceptanceQueue {
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn entry(&self, driver: DriverId) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.driver == driver)
    }

    pub fn entry_mut(&mut self, driver: DriverId) -> Option<&mut QueueEntry> {
        self.entries.iter_mut().find(|e| e.driver == driver)
    }

    pub fn contains(&self, driver: DriverId) -> bool {
        self.entry(driver).is_some()
    }

    /// Any entry still in `viewing` or `interested`.
    pub fn has_active(&self) -> bool {
        self.entries.iter().any(|e| e.status.is_active())
    }

    /// Adds a fresh `viewing` entry. The (ride, driver) pair is unique; a
    /// second add for the same driver is ignored.
    pub fn add_candidate(&mut self, driver: DriverId, distance_to_pickup_km: f64, now_ms: u64) {
        if self.contains(driver) {
            return;
        }
        self.entries.push(QueueEntry {
            driver,
            status: QueueEntryStatus::Viewing,
            distance_to_pickup_km,
            viewed_at_ms: now_ms,
            resolved_at_ms: None,
        });
    }

    /// `viewing → interested`. Repeat calls are no-ops; terminal entries
    /// reject the transition.
    pub fn express_interest(
        &mut self,
        ride: RideId,
        driver: DriverId,
    ) -> Result<Applied, DispatchError> {
        let entry = self
            .entry_mut(driver)
            .ok_or(DispatchError::NoQueueEntry { ride, driver })?;
        match entry.status {
            QueueEntryStatus::Viewing => {
                entry.status = QueueEntryStatus::Interested;
                Ok(Applied::Changed)
            }
            QueueEntryStatus::Interested => Ok(Applied::NoOp),
            from => {
                warn!(?ride, ?driver, from = from.as_str(), "interest from terminal entry");
                Err(DispatchError::InvalidTransition {
                    action: "express_interest",
                    from: from.as_str(),
                })
            }
        }
    }

    /// `viewing|interested → declined`. Terminal for the driver; repeats are
    /// no-ops.
    pub fn decline(
        &mut self,
        ride: RideId,
        driver: DriverId,
        now_ms: u64,
    ) -> Result<Applied, DispatchError> {
        let entry = self
            .entry_mut(driver)
            .ok_or(DispatchError::NoQueueEntry { ride, driver })?;
        match entry.status {
            QueueEntryStatus::Viewing | QueueEntryStatus::Interested => {
                entry.status = QueueEntryStatus::Declined;
                entry.resolved_at_ms = Some(now_ms);
                Ok(Applied::Changed)
            }
            QueueEntryStatus::Declined => Ok(Applied::NoOp),
            from => {
                warn!(?ride, ?driver, from = from.as_str(), "decline from terminal entry");
                Err(DispatchError::InvalidTransition {
                    action: "decline",
                    from: from.as_str(),
                })
            }
        }
    }

    /// Sweeps every active entry to `expired`, returning the affected
    /// drivers in entry order. Declined entries are untouched.
    pub fn expire_active(&mut self, now_ms: u64) -> Vec<DriverId> {
        let mut expired = Vec::new();
        for entry in &mut self.entries {
            if entry.status.is_active() {
                entry.status = QueueEntryStatus::Expired;
                entry.resolved_at_ms = Some(now_ms);
                expired.push(entry.driver);
            }
        }
        expired
    }
}
