//! Notification fan-out: typed presence/queue/ride events for collaborators.
//!
//! Delivery is at-least-once per subscriber; every envelope carries a hub-wide
//! sequence number and the event's own timestamp so subscribers can
//! deduplicate by (entity ID, seq). Ordering is guaranteed within a single
//! ride's stream because all ride/queue mutations commit through one writer
//! and publish immediately after commit; no ordering holds across rides.

use std::sync::mpsc::{channel, Receiver, Sender};

use bevy_ecs::prelude::Resource;
use serde::Serialize;

use crate::ecs::{DriverId, QueueEntryStatus, RideId, RideStatus};
use crate::geo::Coordinates;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Notification {
    /// A driver's presence record changed (online/offline/coordinates).
    Presence {
        driver: DriverId,
        online: bool,
        available: bool,
        coordinates: Coordinates,
        at_ms: u64,
    },
    /// A new opportunity surfaced to a candidate driver.
    QueueOpportunity {
        ride: RideId,
        driver: DriverId,
        distance_to_pickup_km: f64,
        at_ms: u64,
    },
    /// A queue entry changed state.
    QueueEntryChanged {
        ride: RideId,
        driver: DriverId,
        status: QueueEntryStatus,
        at_ms: u64,
    },
    /// A ride transitioned.
    RideStatusChanged {
        ride: RideId,
        status: RideStatus,
        driver: Option<DriverId>,
        at_ms: u64,
    },
}

/// A published notification with its hub-wide sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Envelope {
    pub seq: u64,
    pub event: Notification,
}

/// Publish-subscribe hub. Subscribers receive every envelope published after
/// they subscribe; closed receivers are dropped on the next publish. The hub
/// also retains an audit log of everything published.
#[derive(Debug, Default, Resource)]
pub struct NotificationHub {
    next_seq: u64,
    subscribers: Vec<Sender<Envelope>>,
    published: Vec<Envelope>,
}

impl NotificationHub {
    pub fn subscribe(&mut self) -> Receiver<Envelope> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, event: Notification) {
        let envelope = Envelope {
            seq: self.next_seq,
            event,
        };
        self.next_seq += 1;
        self.subscribers.retain(|tx| tx.send(envelope).is_ok());
        self.published.push(envelope);
    }

    /// Everything published so far, in publish order.
    pub fn published(&self) -> &[Envelope] {
        &self.published
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_published_events_in_order() {
        let mut hub = NotificationHub::default();
        let rx = hub.subscribe();

        hub.publish(Notification::RideStatusChanged {
            ride: RideId(1),
            status: RideStatus::Pending,
            driver: None,
            at_ms: 0,
        });
        hub.publish(Notification::RideStatusChanged {
            ride: RideId(1),
            status: RideStatus::Cancelled,
            driver: None,
            at_ms: 5,
        });

        let first = rx.try_recv().expect("first envelope");
        let second = rx.try_recv().expect("second envelope");
        assert_eq!(first.seq, 0);
        assert_eq!(second.seq, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscriber_does_not_break_publishing() {
        let mut hub = NotificationHub::default();
        let rx = hub.subscribe();
        drop(rx);

        hub.publish(Notification::Presence {
            driver: DriverId(7),
            online: true,
            available: true,
            coordinates: Coordinates::new(52.52, 13.405),
            at_ms: 1,
        });
        assert_eq!(hub.published().len(), 1);
    }
}
