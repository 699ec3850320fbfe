//! In-process notification fan-out
//!
//! The bus is the daemon's [`NotificationSink`]. Delivery channels (email,
//! SMS, a customer's open session) attach with [`EventBus::feed`] or
//! [`EventBus::feed_for`] and receive every later notification in publish
//! order. Publishing never blocks and never fails: with nobody listening the
//! message is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::broadcast;

use super::events::{Event, EventMessage};
use crate::application::ports::{Notification, NotificationSink};

/// Messages buffered per feed before a slow reader starts losing them
const DEFAULT_CAPACITY: usize = 1024;

pub struct EventBus {
    sender: broadcast::Sender<EventMessage>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity);
        Arc::new(Self {
            sender,
            next_id: AtomicU64::new(1),
        })
    }

    /// Publish to every attached feed; returns the message id.
    pub fn publish(&self, event: Event) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let message = EventMessage::new(id, event);
        let event_type = message.event.event_type();
        let user_id = message.event.user_id();

        let delivered = self.sender.send(message).unwrap_or(0);
        debug!(
            "Notification {} published: type={}, user={}, feeds={}",
            id, event_type, user_id, delivered
        );
        id
    }

    /// Every notification, for channels that route by user themselves.
    pub fn feed(&self) -> NotificationFeed {
        NotificationFeed {
            receiver: self.sender.subscribe(),
            user_id: None,
        }
    }

    /// Only the notifications addressed to one customer.
    pub fn feed_for(&self, user_id: i32) -> NotificationFeed {
        NotificationFeed {
            receiver: self.sender.subscribe(),
            user_id: Some(user_id),
        }
    }

    pub fn feed_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl NotificationSink for EventBus {
    fn notify(&self, notification: Notification) {
        self.publish(notification.into());
    }
}

/// A receiver attached to the bus, optionally narrowed to one customer.
pub struct NotificationFeed {
    receiver: broadcast::Receiver<EventMessage>,
    user_id: Option<i32>,
}

impl NotificationFeed {
    /// Next matching notification; `None` once the bus is gone.
    ///
    /// A reader that falls more than the channel capacity behind skips the
    /// lost messages and carries on.
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) if self.accepts(&msg) => return Some(msg),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(
                        "Notification feed (user {:?}) lagged, {} messages lost",
                        self.user_id, missed
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn accepts(&self, msg: &EventMessage) -> bool {
        self.user_id.map_or(true, |user| msg.event.user_id() == user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::NotificationCategory;
    use std::time::Duration;

    fn arrived(user_id: i32, tracking: &str) -> Notification {
        Notification::new(
            user_id,
            NotificationCategory::Package,
            "Package arrived",
            format!("{} was measured", tracking),
        )
    }

    #[tokio::test]
    async fn notify_reaches_feed() {
        let bus = EventBus::new();
        let mut feed = bus.feed();

        bus.notify(arrived(7, "TN-001"));

        let received = tokio::time::timeout(Duration::from_millis(100), feed.recv())
            .await
            .expect("Timeout")
            .expect("No message");
        assert_eq!(received.event.event_type(), "package_update");
        assert_eq!(received.event.user_id(), 7);
        assert_eq!(received.id, 1);
    }

    #[tokio::test]
    async fn customer_feed_skips_other_customers() {
        let bus = EventBus::new();
        let mut feed = bus.feed_for(9);

        bus.notify(arrived(7, "TN-001"));
        bus.notify(arrived(9, "TN-002"));
        bus.notify(arrived(7, "TN-003"));
        bus.notify(arrived(9, "TN-004"));

        let first = feed.recv().await.unwrap();
        let second = feed.recv().await.unwrap();
        assert_eq!(first.event.payload().message, "TN-002 was measured");
        assert_eq!(second.event.payload().message, "TN-004 was measured");
        assert!(first.id < second.id);
    }

    #[tokio::test]
    async fn lagging_feed_resumes_with_newest() {
        let bus = EventBus::with_capacity(2);
        let mut feed = bus.feed();
        for n in 0..5 {
            bus.notify(arrived(1, &format!("TN-{}", n)));
        }
        let next = feed.recv().await.unwrap();
        assert_eq!(next.event.payload().message, "TN-3 was measured");
    }

    #[test]
    fn publishing_without_feeds_is_harmless() {
        let bus = EventBus::new();
        assert_eq!(bus.feed_count(), 0);
        assert_eq!(bus.publish(arrived(1, "TN-1").into()), 1);

        let feed = bus.feed_for(1);
        assert_eq!(bus.feed_count(), 1);
        drop(feed);
        assert_eq!(bus.feed_count(), 0);
        assert_eq!(bus.publish(arrived(1, "TN-2").into()), 2);
    }
}
