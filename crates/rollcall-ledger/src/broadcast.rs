//! # Change Broadcaster
//!
//! Fan-out of committed changes to every connected viewer. Delivery is
//! best-effort and non-durable: a subscriber that is not listening when an
//! event is published never sees it, and a subscriber that falls too far
//! behind loses the oldest events. Viewers re-fetch the ledger on
//! (re)connect.

use rollcall_core::AttendanceChange;
use serde::Serialize;
use tokio::sync::broadcast;

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 256;

/// One `attendance-changed` event. Unaddressed: every viewer receives every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// The committed `(student, day, status)` tuples.
    pub changes: Vec<AttendanceChange>,
}

/// Handle injected into the check-in and override processors.
#[derive(Debug, Clone)]
pub struct ChangeBroadcaster {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeBroadcaster {
    /// Create a broadcaster buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish `changes`. Never blocks; returns the number of live subscribers reached.
    pub fn publish(&self, changes: Vec<AttendanceChange>) -> usize {
        if changes.is_empty() {
            return 0;
        }
        let count = changes.len();
        match self.sender.send(ChangeEvent { changes }) {
            Ok(receivers) => {
                tracing::debug!(changes = count, receivers, "attendance change published");
                receivers
            }
            // No viewer connected; the event is simply dropped.
            Err(_) => 0,
        }
    }

    /// Register a new viewer.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Number of currently connected viewers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{AttendanceStatus, SchoolDay, StudentId};

    fn change(id: i64) -> AttendanceChange {
        AttendanceChange {
            student_id: StudentId::new(id),
            day: SchoolDay::parse("2025-03-10").unwrap(),
            status: AttendanceStatus::Present,
        }
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let broadcaster = ChangeBroadcaster::default();
        assert_eq!(broadcaster.publish(vec![change(1)]), 0);
    }

    #[tokio::test]
    async fn every_subscriber_receives_event() {
        let broadcaster = ChangeBroadcaster::default();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();
        assert_eq!(broadcaster.publish(vec![change(1), change(2)]), 2);

        let got_a = a.recv().await.unwrap();
        let got_b = b.recv().await.unwrap();
        assert_eq!(got_a, got_b);
        assert_eq!(got_a.changes.len(), 2);
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_events() {
        let broadcaster = ChangeBroadcaster::default();
        let _early = broadcaster.subscribe();
        broadcaster.publish(vec![change(1)]);
        let mut late = broadcaster.subscribe();
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn empty_change_list_is_not_published() {
        let broadcaster = ChangeBroadcaster::default();
        let mut rx = broadcaster.subscribe();
        assert_eq!(broadcaster.publish(Vec::new()), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn event_serializes_as_change_list() {
        let json = serde_json::to_value(ChangeEvent {
            changes: vec![change(42)],
        })
        .unwrap();
        assert_eq!(json["changes"][0]["studentId"], 42);
        assert_eq!(json["changes"][0]["status"], "present");
    }
}
