//! Ride state machine: `pending → accepted → in_progress → completed`, with
//! `cancelled` reachable from `pending` or `accepted`. Every transition is
//! one-way.
//!
//! `commit_accept` is the contended commit point. The facade is the single
//! writer, so the status check and write here execute as one atomic
//! compare-and-set from any caller's point of view: exactly one accept per
//! ride observes `pending`, and the sibling-expiry sweep lands in the same
//! logical transaction. An accept racing a cancellation resolves the same
//! way: whichever commits first flips the status and the loser observes a
//! non-pending ride.

use tracing::{debug, info, warn};

use crate::ecs::{CancelReason, DriverId, QueueEntryStatus, Ride, RideStatus};
use crate::error::DispatchError;
use crate::queue::AcceptanceQueue;

/// Result of an accept attempt. Losing the race is an expected outcome, not
/// an error: the UI shows "this ride was taken" and moves on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// This driver won the ride; siblings listed here were swept to expired.
    Committed { expired: Vec<DriverId> },
    /// The winner repeated an identical accept while the ride is still in
    /// `accepted`. Nothing changed and nothing is republished.
    AlreadyCommitted,
    /// The ride was no longer pending (another driver won, or it was
    /// cancelled) by the time this accept arrived.
    AlreadyTaken,
}

/// State swept by a successful cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelCommit {
    /// Active entries expired by the cancellation, in entry order.
    pub expired: Vec<DriverId>,
    /// Driver released back to the pool when an accepted ride is cancelled.
    pub released: Option<DriverId>,
}

/// Atomically commits `driver` as the ride's assignee if the ride is still
/// pending, expiring every sibling entry still in `viewing`/`interested`.
/// Repeating the winner's accept is a no-op ([AcceptOutcome::AlreadyCommitted]).
pub fn commit_accept(
    ride: &mut Ride,
    queue: &mut AcceptanceQueue,
    driver: DriverId,
    now_ms: u64,
) -> Result<AcceptOutcome, DispatchError> {
    let entry_status = queue
        .entry(driver)
        .ok_or(DispatchError::NoQueueEntry { ride: ride.id, driver })?
        .status;

    // Repeated identical accept from the winner. Quiet only while the ride
    // is still in `accepted`; once the trip has started or finished, a late
    // repeat must not look like a fresh commit.
    if entry_status == QueueEntryStatus::Accepted && ride.driver == Some(driver) {
        return if ride.status == RideStatus::Accepted {
            Ok(AcceptOutcome::AlreadyCommitted)
        } else {
            Ok(AcceptOutcome::AlreadyTaken)
        };
    }

    // Compare-and-set guard: only a pending ride can be taken.
    if ride.status != RideStatus::Pending {
        debug!(ride = ?ride.id, ?driver, status = ride.status.as_str(), "accept lost the race");
        return Ok(AcceptOutcome::AlreadyTaken);
    }

    if !entry_status.is_active() {
        warn!(ride = ?ride.id, ?driver, from = entry_status.as_str(), "accept from terminal entry");
        return Err(DispatchError::InvalidTransition {
            action: "accept",
            from: entry_status.as_str(),
        });
    }

    ride.status = RideStatus::Accepted;
    ride.driver = Some(driver);
    let entry = queue.entry_mut(driver).expect("entry checked above");
    entry.status = QueueEntryStatus::Accepted;
    entry.resolved_at_ms = Some(now_ms);
    let expired = queue.expire_active(now_ms);

    info!(ride = ?ride.id, ?driver, siblings_expired = expired.len(), "ride accepted");
    Ok(AcceptOutcome::Committed { expired })
}

/// Cancels a pending or accepted ride, expiring all active queue entries in
/// the same transaction. Cancelling an already-cancelled ride is a no-op
/// (`Ok(None)`); cancelling a ride in progress or completed is invalid.
pub fn cancel(
    ride: &mut Ride,
    queue: &mut AcceptanceQueue,
    reason: CancelReason,
    now_ms: u64,
) -> Result<Option<CancelCommit>, DispatchError> {
    match ride.status {
        RideStatus::Pending | RideStatus::Accepted => {}
        RideStatus::Cancelled => return Ok(None),
        from => {
            warn!(ride = ?ride.id, from = from.as_str(), "cancel from non-cancellable state");
            return Err(DispatchError::InvalidTransition {
                action: "cancel",
                from: from.as_str(),
            });
        }
    }

    let released = ride.driver.take();
    ride.status = RideStatus::Cancelled;
    ride.cancel_reason = Some(reason);
    let expired = queue.expire_active(now_ms);

    info!(ride = ?ride.id, ?reason, entries_expired = expired.len(), "ride cancelled");
    Ok(Some(CancelCommit { expired, released }))
}

/// `accepted → in_progress`, driven by the external ride-execution signal.
pub fn start_trip(ride: &mut Ride) -> Result<(), DispatchError> {
    if ride.status != RideStatus::Accepted {
        return Err(DispatchError::InvalidTransition {
            action: "start_trip",
            from: ride.status.as_str(),
        });
    }
    ride.status = RideStatus::InProgress;
    Ok(())
}

/// `in_progress → completed`.
pub fn complete_trip(ride: &mut Ride) -> Result<(), DispatchError> {
    if ride.status != RideStatus::InProgress {
        return Err(DispatchError::InvalidTransition {
            action: "complete_trip",
            from: ride.status.as_str(),
        });
    }
    ride.status = RideStatus::Completed;
    Ok(())
}
