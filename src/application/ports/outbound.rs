//! Outbound ports: collaborators the billing core calls but does not own
//!
//! - [`InvoiceProvider`]: third-party invoicing, only called from
//!   [`InvoiceService`](crate::application::services::InvoiceService)
//! - [`NotificationSink`]: user notifications, fire-and-forget
//! - [`FileStore`]: opaque file references (package photos, deposit proofs)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::InvoiceTarget;

// ── InvoiceProvider ────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLine {
    pub description: String,
    pub amount: i64,
}

/// Request to issue one invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRequest {
    pub target: InvoiceTarget,
    /// Same value on every attempt for the same target
    pub idempotency_key: String,
    pub owner_user_id: i32,
    pub total: i64,
    pub lines: Vec<InvoiceLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedInvoice {
    pub invoice_number: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvoiceError {
    /// Provider refused the request; retrying unchanged will not help
    #[error("invoice rejected: {0}")]
    Rejected(String),
    /// Provider unreachable or timed out
    #[error("invoice provider unavailable: {0}")]
    Unavailable(String),
}

impl InvoiceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

#[async_trait]
pub trait InvoiceProvider: Send + Sync {
    async fn issue(&self, request: InvoiceRequest) -> Result<IssuedInvoice, InvoiceError>;
    async fn void(&self, invoice_number: &str, reason: &str) -> Result<(), InvoiceError>;
}

// ── NotificationSink ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Package,
    Shipment,
    Wallet,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Package => "package",
            Self::Shipment => "shipment",
            Self::Wallet => "wallet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub user_id: i32,
    pub title: String,
    pub message: String,
    pub category: NotificationCategory,
    pub link: Option<String>,
}

impl Notification {
    pub fn new(
        user_id: i32,
        category: NotificationCategory,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            category,
            link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

/// Fire-and-forget; implementations swallow and log their own failures.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

// ── FileStore ──────────────────────────────────────────────────

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("file store error for {path}: {message}")]
pub struct FileStoreError {
    pub path: String,
    pub message: String,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn exists(&self, path: &str) -> bool;
    async fn delete(&self, path: &str) -> Result<(), FileStoreError>;
}
