//! Discrete event clock: drives time-based behavior (presence refresh ticks,
//! pending-ride timeouts, re-match sweeps) in timestamp order.
//!
//! Timestamps are milliseconds. Events at the same timestamp pop in FIFO
//! order via a monotonically increasing sequence number.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::Resource;

use crate::ecs::{DriverId, RideId};

pub const ONE_SEC_MS: u64 = 1000;
pub const ONE_MIN_MS: u64 = 60 * ONE_SEC_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    PresenceRefreshTick,
    PendingRideTimeout,
    RematchSweep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSubject {
    Driver(DriverId),
    Ride(RideId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub timestamp: u64,
    pub kind: EventKind,
    pub subject: Option<EventSubject>,
    seq: u64,
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by timestamp,
        // FIFO within a timestamp.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The current event being processed, inserted by the runner before each
/// schedule pass.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);

#[derive(Debug, Default, Resource)]
pub struct DispatchClock {
    now: u64,
    next_seq: u64,
    events: BinaryHeap<Event>,
}

impl DispatchClock {
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn schedule_at(&mut self, timestamp: u64, kind: EventKind, subject: Option<EventSubject>) {
        debug_assert!(
            timestamp >= self.now,
            "event timestamp must be >= current time"
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event {
            timestamp,
            kind,
            subject,
            seq,
        });
    }

    pub fn schedule_in(&mut self, delay_ms: u64, kind: EventKind, subject: Option<EventSubject>) {
        self.schedule_at(self.now + delay_ms, kind, subject);
    }

    pub fn schedule_in_secs(&mut self, secs: u64, kind: EventKind, subject: Option<EventSubject>) {
        self.schedule_in(secs * ONE_SEC_MS, kind, subject);
    }

    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|e| e.timestamp)
    }

    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        self.now = event.timestamp;
        Some(event)
    }

    /// Move the clock forward without processing events. Used to settle at a
    /// target time after draining everything due before it.
    pub fn advance_to(&mut self, timestamp: u64) {
        debug_assert!(timestamp >= self.now, "clock must not move backwards");
        self.now = self.now.max(timestamp);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_pops_events_in_time_order() {
        let mut clock = DispatchClock::default();
        clock.schedule_at(10, EventKind::RematchSweep, None);
        clock.schedule_at(5, EventKind::PendingRideTimeout, None);
        clock.schedule_at(20, EventKind::PresenceRefreshTick, None);

        let first = clock.pop_next().expect("first event");
        assert_eq!(first.timestamp, 5);
        assert_eq!(clock.now(), 5);

        let second = clock.pop_next().expect("second event");
        assert_eq!(second.timestamp, 10);

        let third = clock.pop_next().expect("third event");
        assert_eq!(third.timestamp, 20);
        assert_eq!(clock.now(), 20);

        assert!(clock.pop_next().is_none());
        assert!(clock.is_empty());
    }

    #[test]
    fn same_timestamp_events_pop_fifo() {
        let mut clock = DispatchClock::default();
        let d1 = DriverId(1);
        let d2 = DriverId(2);
        clock.schedule_at(7, EventKind::PresenceRefreshTick, Some(EventSubject::Driver(d1)));
        clock.schedule_at(7, EventKind::PresenceRefreshTick, Some(EventSubject::Driver(d2)));

        let first = clock.pop_next().expect("first");
        let second = clock.pop_next().expect("second");
        assert_eq!(first.subject, Some(EventSubject::Driver(d1)));
        assert_eq!(second.subject, Some(EventSubject::Driver(d2)));
    }

    #[test]
    fn schedule_in_is_relative_to_now() {
        let mut clock = DispatchClock::default();
        clock.schedule_at(1000, EventKind::RematchSweep, None);
        clock.pop_next().expect("event");
        clock.schedule_in_secs(30, EventKind::PresenceRefreshTick, None);
        assert_eq!(clock.next_event_time(), Some(1000 + 30 * ONE_SEC_MS));
    }
}
