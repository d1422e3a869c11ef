//! Event system for tracking operations
//!
//! Points changes are broadcast so leaderboard and profile views can refresh
//! without polling the store. Emitting never blocks or fails the caller.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::points::ActivityCategory;

/// Events emitted by the recorder and reconciler
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    /// A new completion fact earned points
    PointsAwarded {
        student_id: String,
        topic_id: String,
        category: ActivityCategory,
        points: i64,
        cached_total: i64,
    },
    /// The fact was already recorded; nothing changed in the points
    AlreadyCounted {
        student_id: String,
        topic_id: String,
        category: ActivityCategory,
    },
    /// A recorder call gave up; the user-facing action was not affected
    TrackingFailed {
        student_id: String,
        category: ActivityCategory,
        reason: String,
    },
    /// A reconcile pass corrected a drifted cached total
    PointsReconciled {
        student_id: String,
        old_total: i64,
        new_total: i64,
    },
    BulkReconcileFinished {
        successes: usize,
        errors: usize,
        corrected: usize,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &TrackingEvent);
}

/// Event bus for broadcasting tracking events
pub struct EventBus {
    sender: broadcast::Sender<TrackingEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: TrackingEvent) {
        trace!(event = ?event, "Emitting tracking event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackingEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logs every event at debug level, failures at warn
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &TrackingEvent) {
        match event {
            TrackingEvent::PointsAwarded { student_id, topic_id, category, points, .. } => {
                debug!(student_id = %student_id, topic_id = %topic_id, category = %category, points, "Points awarded");
            }
            TrackingEvent::TrackingFailed { student_id, category, reason } => {
                warn!(student_id = %student_id, category = %category, reason = %reason, "Tracking failed");
            }
            TrackingEvent::PointsReconciled { student_id, old_total, new_total } => {
                debug!(student_id = %student_id, old_total, new_total, "Points reconciled");
            }
            _ => {
                trace!(event = ?event, "Tracking event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(TrackingEvent::PointsReconciled {
            student_id: "s1".into(),
            old_total: 60,
            new_total: 40,
        });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");

        assert_eq!(
            event,
            TrackingEvent::PointsReconciled {
                student_id: "s1".into(),
                old_total: 60,
                new_total: 40,
            }
        );
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(TrackingEvent::BulkReconcileFinished {
            successes: 0,
            errors: 0,
            corrected: 0,
        });
    }
}
