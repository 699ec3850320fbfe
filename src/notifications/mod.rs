//! Notifications module
//!
//! In-process fan-out of user notifications.
//!
//! # Usage
//! ```ignore
//! use freight_billing::application::ports::{Notification, NotificationCategory, NotificationSink};
//! use freight_billing::notifications::EventBus;
//!
//! let bus = EventBus::new();
//! let mut feed = bus.feed_for(7);
//!
//! bus.notify(Notification::new(7, NotificationCategory::Package, "Package arrived", "TN-001"));
//! let message = feed.recv().await;
//! ```

pub mod event_bus;
pub mod events;

pub use event_bus::{EventBus, NotificationFeed};
pub use events::*;
