//! Invoice issuance
//!
//! The effect half of the invoice trigger. Every issuance first claims the
//! target in the ledger, so concurrent or repeated triggers reach the
//! provider at most once per target. Provider failures are recorded on the
//! entity and never undo the transition that triggered them. A claim that
//! never reaches the ledger's outcome (a crash mid-call, a failed write)
//! expires after the claim lease and is picked up by the retry sweep.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::application::ports::{InvoiceError, InvoiceLine, InvoiceProvider, InvoiceRequest};
use crate::domain::invoice::InvoiceTarget;
use crate::domain::shipment::{Shipment, ShipmentStatus};
use crate::domain::wallet::{TransactionStatus, WalletTransaction};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::shared::retry::{retry_with_backoff, RetryConfig};

/// What happened to one issuance attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceOutcome {
    Issued(String),
    /// Another issuer holds the target or an invoice already exists
    AlreadyClaimed,
    /// Recorded as `Failed`; eligible for [`InvoiceService::retry_failed`]
    Failed(String),
}

/// Totals of one retry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub attempted: usize,
    pub issued: usize,
    pub failed: usize,
}

pub struct InvoiceService {
    repos: Arc<dyn RepositoryProvider>,
    provider: Arc<dyn InvoiceProvider>,
    retry: RetryConfig,
    claim_lease: Duration,
}

impl InvoiceService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        provider: Arc<dyn InvoiceProvider>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            repos,
            provider,
            retry,
            claim_lease: Duration::minutes(10),
        }
    }

    /// How long an `Issuing` claim is honoured before it counts as abandoned.
    /// Must exceed the longest provider call including retries, or a slow
    /// issuer can be overtaken by the sweep.
    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    fn stale_before(&self) -> DateTime<Utc> {
        Utc::now()
            .checked_sub_signed(self.claim_lease)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub async fn issue_for_shipment(&self, shipment: &Shipment) -> InvoiceOutcome {
        self.issue(shipment_request(shipment)).await
    }

    pub async fn issue_for_deposit(
        &self,
        transaction: &WalletTransaction,
        owner_user_id: i32,
    ) -> InvoiceOutcome {
        self.issue(deposit_request(transaction, owner_user_id)).await
    }

    async fn issue(&self, request: InvoiceRequest) -> InvoiceOutcome {
        let target = request.target;
        let ledger = self.repos.invoices();

        match ledger.claim(target, self.stale_before()).await {
            Ok(true) => {}
            Ok(false) => {
                info!(%target, "Invoice already claimed, skipping");
                return InvoiceOutcome::AlreadyClaimed;
            }
            Err(e) => {
                error!(%target, error = %e, "Could not claim invoice");
                return InvoiceOutcome::Failed(e.to_string());
            }
        }

        let result = retry_with_backoff(
            &self.retry,
            || self.provider.issue(request.clone()),
            InvoiceError::is_transient,
            "issue_invoice",
        )
        .await;

        match result {
            Ok(issued) => {
                if let Err(e) = ledger
                    .record_issued(target, &issued.invoice_number, issued.issued_at)
                    .await
                {
                    // The provider holds the invoice. The claim stays Issuing
                    // until its lease runs out; the sweep then re-sends the
                    // same idempotency key and records the same number.
                    error!(
                        %target,
                        invoice = issued.invoice_number.as_str(),
                        error = %e,
                        "Invoice issued but not recorded"
                    );
                }
                metrics::counter!("freight_invoices_issued_total").increment(1);
                info!(
                    %target,
                    invoice = issued.invoice_number.as_str(),
                    total = request.total,
                    "Invoice issued"
                );
                InvoiceOutcome::Issued(issued.invoice_number)
            }
            Err(e) => {
                let reason = e.to_string();
                if let Err(record_err) = ledger.record_failed(target, &reason).await {
                    error!(%target, error = %record_err, "Could not record invoice failure");
                }
                metrics::counter!("freight_invoices_failed_total").increment(1);
                warn!(%target, error = %reason, "Invoice issuance failed");
                InvoiceOutcome::Failed(reason)
            }
        }
    }

    /// Re-attempt every target whose last issuance failed or whose claim
    /// was abandoned.
    pub async fn retry_failed(&self) -> DomainResult<RetrySummary> {
        let targets = self
            .repos
            .invoices()
            .find_retryable(self.stale_before())
            .await?;
        let mut summary = RetrySummary::default();

        for target in targets {
            let Some(request) = self.rebuild_request(target).await? else {
                continue;
            };
            summary.attempted += 1;
            match self.issue(request).await {
                InvoiceOutcome::Issued(_) => summary.issued += 1,
                InvoiceOutcome::Failed(_) => summary.failed += 1,
                InvoiceOutcome::AlreadyClaimed => {}
            }
        }

        if summary.attempted > 0 {
            info!(
                attempted = summary.attempted,
                issued = summary.issued,
                failed = summary.failed,
                "Invoice retry sweep finished"
            );
        }
        Ok(summary)
    }

    async fn rebuild_request(&self, target: InvoiceTarget) -> DomainResult<Option<InvoiceRequest>> {
        match target {
            // A shipment cancelled after a failed attempt is no longer billable
            InvoiceTarget::Shipment(id) => Ok(self
                .repos
                .shipments()
                .find_by_id(id)
                .await?
                .filter(|s| s.status != ShipmentStatus::Cancelled)
                .map(|s| shipment_request(&s))),
            InvoiceTarget::WalletTransaction(id) => {
                let Some(tx) = self
                    .repos
                    .wallets()
                    .find_transaction(id)
                    .await?
                    .filter(|tx| tx.status == TransactionStatus::Completed)
                else {
                    return Ok(None);
                };
                let wallet = self
                    .repos
                    .wallets()
                    .find_by_id(tx.wallet_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("Wallet", tx.wallet_id))?;
                Ok(Some(deposit_request(&tx, wallet.owner_user_id)))
            }
        }
    }

    /// Void an issued invoice at the provider, then record it.
    pub async fn void(
        &self,
        target: InvoiceTarget,
        invoice_number: &str,
        reason: &str,
    ) -> DomainResult<()> {
        retry_with_backoff(
            &self.retry,
            || self.provider.void(invoice_number, reason),
            InvoiceError::is_transient,
            "void_invoice",
        )
        .await
        .map_err(|e| DomainError::External(e.to_string()))?;

        if !self.repos.invoices().record_voided(target).await? {
            return Err(DomainError::Storage(format!(
                "invoice {} for {} was voided at the provider but is no longer issued locally",
                invoice_number, target
            )));
        }
        info!(%target, invoice = invoice_number, reason, "Invoice voided");
        Ok(())
    }
}

fn shipment_request(shipment: &Shipment) -> InvoiceRequest {
    let target = InvoiceTarget::Shipment(shipment.id);
    let base = if shipment.minimum_applied {
        "Freight (minimum charge)"
    } else {
        "Freight"
    };
    let lines = [
        (base, shipment.base_fee),
        ("Oversized surcharge", shipment.oversized_fee),
        ("Overweight surcharge", shipment.overweight_fee),
        ("Remote area surcharge", shipment.remote_area_fee),
    ]
    .into_iter()
    .filter(|(_, amount)| *amount != 0)
    .map(|(description, amount)| InvoiceLine {
        description: description.to_string(),
        amount,
    })
    .collect();

    InvoiceRequest {
        target,
        idempotency_key: target.idempotency_key(),
        owner_user_id: shipment.owner_user_id,
        total: shipment.total_fee,
        lines,
    }
}

fn deposit_request(transaction: &WalletTransaction, owner_user_id: i32) -> InvoiceRequest {
    let target = InvoiceTarget::WalletTransaction(transaction.id);
    InvoiceRequest {
        target,
        idempotency_key: target.idempotency_key(),
        owner_user_id,
        total: transaction.amount,
        lines: vec![InvoiceLine {
            description: "Wallet deposit".to_string(),
            amount: transaction.amount,
        }],
    }
}
