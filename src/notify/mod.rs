//! Best-effort delivery of lifecycle notifications.
//!
//! The supervisor reports everything a human might care about through a
//! [`NotificationSink`]. Delivery never blocks and never fails the caller:
//! if nobody is listening, the notification is dropped.
//!
//! Provided sinks:
//!
//! * [`BroadcastSink`] fans notifications out to any number of subscribers
//!   over a Tokio broadcast channel (used by the HTTP event stream).
//! * [`TracingSink`] writes every notification to the log.
//! * [`FanoutSink`] forwards to several sinks.
use std::sync::Arc;
use tokio::sync::broadcast;

mod events;

pub use events::{LifecycleEvent, Notification};

/// Receives lifecycle notifications.
///
/// Implementations must return promptly and swallow their own failures.
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification, or drop it
    fn notify(&self, notification: &Notification);
}

/// Broadcasts notifications to every current subscriber.
///
/// # Example
///
/// ```
/// use gameserver_supervisor::notify::{BroadcastSink, LifecycleEvent, Notification, NotificationSink};
///
/// let sink = BroadcastSink::new(16);
/// let mut rx = sink.subscribe();
///
/// sink.notify(&Notification::new("Minecraft", LifecycleEvent::Started));
/// assert_eq!(rx.try_recv().unwrap().event, LifecycleEvent::Started);
/// ```
#[derive(Clone)]
pub struct BroadcastSink {
    /// Broadcast channel shared with all subscribers
    sender: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    /// Create a sink buffering up to `capacity` notifications per slow subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Get a new receiver for future notifications
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&self, notification: &Notification) {
        if self.sender.receiver_count() == 0 {
            tracing::debug!(event = notification.event.kind(), "No subscribers, notification dropped");
            return;
        }

        if let Err(e) = self.sender.send(notification.clone()) {
            tracing::debug!(error = %e, "Notification dropped");
        }
    }
}

/// Logs every notification at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, notification: &Notification) {
        tracing::info!(
            server = %notification.server,
            event = notification.event.kind(),
            "{}",
            notification
        );
    }
}

/// Forwards each notification to every wrapped sink, in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    /// Create an empty fan-out
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&self, notification: &Notification) {
        for sink in &self.sinks {
            sink.notify(notification);
        }
    }
}
