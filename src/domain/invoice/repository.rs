//! Invoice bookkeeping repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::InvoiceTarget;
use crate::domain::DomainResult;

#[async_trait]
pub trait InvoiceLedger: Send + Sync {
    /// Atomically move the target from `None`/`Failed` (with no reference) to
    /// `Issuing`. An `Issuing` claim taken before `stale_before` counts as
    /// abandoned and may be taken over. Returns false when another issuer
    /// holds it, an invoice already exists, or the entity is no longer
    /// billable (a cancelled shipment, an unapproved deposit).
    async fn claim(&self, target: InvoiceTarget, stale_before: DateTime<Utc>) -> DomainResult<bool>;
    async fn record_issued(
        &self,
        target: InvoiceTarget,
        invoice_number: &str,
        issued_at: DateTime<Utc>,
    ) -> DomainResult<()>;
    async fn record_failed(&self, target: InvoiceTarget, error: &str) -> DomainResult<()>;
    /// Mark an issued invoice as voided. Returns false if it was not `Issued`.
    async fn record_voided(&self, target: InvoiceTarget) -> DomainResult<bool>;
    /// Every target whose last issuance failed or whose claim was abandoned
    /// before `stale_before`.
    async fn find_retryable(&self, stale_before: DateTime<Utc>) -> DomainResult<Vec<InvoiceTarget>>;
}
