//! Notification events
//!
//! Every user-facing notification is published on the bus as one of these,
//! keyed by the category it concerns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::ports::{Notification, NotificationCategory};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// Package arrived, was re-measured, or was removed
    PackageUpdate(NotificationEvent),
    /// Shipment created, moved, or cancelled
    ShipmentUpdate(NotificationEvent),
    /// Deposit reviewed or balance adjusted
    WalletUpdate(NotificationEvent),
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::PackageUpdate(_) => "package_update",
            Event::ShipmentUpdate(_) => "shipment_update",
            Event::WalletUpdate(_) => "wallet_update",
        }
    }

    pub fn user_id(&self) -> i32 {
        self.payload().user_id
    }

    pub fn payload(&self) -> &NotificationEvent {
        match self {
            Event::PackageUpdate(e) | Event::ShipmentUpdate(e) | Event::WalletUpdate(e) => e,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub user_id: i32,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
}

impl From<Notification> for Event {
    fn from(n: Notification) -> Self {
        let payload = NotificationEvent {
            user_id: n.user_id,
            title: n.title,
            message: n.message,
            link: n.link,
        };
        match n.category {
            NotificationCategory::Package => Event::PackageUpdate(payload),
            NotificationCategory::Shipment => Event::ShipmentUpdate(payload),
            NotificationCategory::Wallet => Event::WalletUpdate(payload),
        }
    }
}

/// Wrapper for sending events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    /// Monotonic per bus
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(id: u64, event: Event) -> Self {
        Self {
            id,
            timestamp: Utc::now(),
            event,
        }
    }
}
