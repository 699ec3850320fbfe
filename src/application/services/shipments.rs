//! Shipment aggregation service
//!
//! Combines arrived packages into shipments, drives the shipment state
//! machine, and fires the invoice trigger after a committed transition.
//! Preview and creation share one pricing path, so an unchanged selection
//! always previews and commits at the same total.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::info;
use validator::Validate;

use super::invoicing::{InvoiceOutcome, InvoiceService};
use super::rate_table::RateTableStore;
use crate::application::dto::CreateShipmentRequest;
use crate::application::ports::{Notification, NotificationCategory, NotificationSink};
use crate::domain::invoice::{should_issue, InvoiceStatus, InvoiceTarget};
use crate::domain::pricing::{price_shipment, PricedBox, ShipmentQuote};
use crate::domain::shipment::{
    CancelOutcome, NewShipment, Shipment, ShipmentMember, ShipmentStatus,
};
use crate::domain::wallet::WalletTransaction;
use crate::domain::{DomainError, DomainResult, RepositoryProvider};
use crate::shared::errors::{UnavailablePackage, UnavailableReason};

/// A validated selection priced under one rate table snapshot.
struct ShipmentPlan {
    members: Vec<ShipmentMember>,
    quote: ShipmentQuote,
    rate_version: String,
}

pub struct ShipmentService {
    repos: Arc<dyn RepositoryProvider>,
    rates: Arc<RateTableStore>,
    invoices: Arc<InvoiceService>,
    notifier: Arc<dyn NotificationSink>,
}

impl ShipmentService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        rates: Arc<RateTableStore>,
        invoices: Arc<InvoiceService>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            repos,
            rates,
            invoices,
            notifier,
        }
    }

    /// Validate the selection and price it from the stored box quotes.
    ///
    /// Every offending package is reported, in request order.
    async fn plan(
        &self,
        owner_user_id: i32,
        package_ids: &[i32],
        remote_area_rate: i64,
    ) -> DomainResult<ShipmentPlan> {
        if package_ids.is_empty() {
            return Err(DomainError::Validation("select at least one package".into()));
        }
        if remote_area_rate < 0 {
            return Err(DomainError::Validation(
                "remote area rate must not be negative".into(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = package_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(DomainError::Validation(format!(
                "package {} selected more than once",
                dup
            )));
        }

        let table = self.rates.snapshot();
        let found: HashMap<i32, _> = self
            .repos
            .packages()
            .find_by_ids(package_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut unavailable = Vec::new();
        let mut members = Vec::with_capacity(package_ids.len());
        let mut boxes: Vec<PricedBox> = Vec::new();
        for &package_id in package_ids {
            let Some(package) = found.get(&package_id) else {
                unavailable.push(UnavailablePackage {
                    package_id,
                    reason: UnavailableReason::NotFound,
                });
                continue;
            };
            if let Some(reason) = package.unavailable_reason(owner_user_id) {
                unavailable.push(UnavailablePackage { package_id, reason });
                continue;
            }
            members.push(ShipmentMember {
                package_id,
                revision: package.revision,
                fee: package.computed_fee,
            });
            boxes.extend(package.boxes.iter().cloned());
        }
        if !unavailable.is_empty() {
            return Err(DomainError::PackageUnavailable(unavailable));
        }

        Ok(ShipmentPlan {
            members,
            quote: price_shipment(&boxes, remote_area_rate, table.constants())?,
            rate_version: table.version().to_string(),
        })
    }

    /// Read-only estimate of what [`Self::create_shipment`] would charge.
    pub async fn preview_cost(
        &self,
        owner_user_id: i32,
        package_ids: &[i32],
        remote_area_rate: i64,
    ) -> DomainResult<ShipmentQuote> {
        Ok(self
            .plan(owner_user_id, package_ids, remote_area_rate)
            .await?
            .quote)
    }

    pub async fn create_shipment(&self, request: CreateShipmentRequest) -> DomainResult<Shipment> {
        request.validate()?;
        let plan = self
            .plan(
                request.owner_user_id,
                &request.package_ids,
                request.remote_area_rate,
            )
            .await?;

        let shipment = self
            .repos
            .shipments()
            .create(NewShipment {
                owner_user_id: request.owner_user_id,
                recipient: request.recipient.into(),
                members: plan.members,
                quote: plan.quote,
                rate_version: plan.rate_version,
            })
            .await?;

        metrics::counter!("freight_shipments_created_total").increment(1);
        info!(
            shipment_id = shipment.id,
            owner = shipment.owner_user_id,
            packages = shipment.package_ids.len(),
            total_fee = shipment.total_fee,
            rate_version = shipment.rate_version.as_str(),
            "Shipment created"
        );
        self.notify(
            &shipment,
            "Shipment created",
            format!(
                "Shipment #{} with {} package(s) awaits payment of {}",
                shipment.id,
                shipment.package_ids.len(),
                shipment.total_fee
            ),
        );
        Ok(shipment)
    }

    /// Move a shipment along its state machine. Moving to `Cancelled` is the
    /// same as [`Self::cancel`] without a reason.
    pub async fn update_status(&self, id: i32, next: ShipmentStatus) -> DomainResult<Shipment> {
        if next == ShipmentStatus::Cancelled {
            return Ok(self.cancel(id, None).await?.shipment);
        }

        let current = self.get(id).await?;
        current.ensure_transition(next)?;
        let previous = current.status;
        let updated = self
            .repos
            .shipments()
            .transition(id, previous, next)
            .await?;
        info!(shipment_id = id, from = %previous, to = %next, "Shipment status changed");

        let shipment = self.invoice_after(updated, previous).await?;
        self.notify(
            &shipment,
            "Shipment status changed",
            format!("Shipment #{} is now {}", shipment.id, shipment.status),
        );
        Ok(shipment)
    }

    /// Pay the shipment from the owner's wallet and start processing it.
    pub async fn pay_with_wallet(&self, id: i32) -> DomainResult<(Shipment, WalletTransaction)> {
        let (paid, payment) = self.repos.shipments().settle_from_wallet(id).await?;
        info!(
            shipment_id = id,
            transaction_id = payment.id,
            amount = payment.amount,
            "Shipment paid from wallet"
        );

        let shipment = self.invoice_after(paid, ShipmentStatus::PendingPayment).await?;
        self.notify(
            &shipment,
            "Shipment paid",
            format!(
                "Shipment #{} was paid from your wallet ({})",
                shipment.id, shipment.total_fee
            ),
        );
        Ok((shipment, payment))
    }

    /// Fire the invoice trigger for a committed move out of `previous`.
    ///
    /// Issuance problems are recorded on the shipment, never returned.
    async fn invoice_after(
        &self,
        shipment: Shipment,
        previous: ShipmentStatus,
    ) -> DomainResult<Shipment> {
        if !should_issue(&shipment, previous, shipment.status) {
            return Ok(shipment);
        }
        match self.invoices.issue_for_shipment(&shipment).await {
            InvoiceOutcome::AlreadyClaimed => Ok(shipment),
            InvoiceOutcome::Issued(_) | InvoiceOutcome::Failed(_) => self.get(shipment.id).await,
        }
    }

    /// Customer cancellation; releases every package and refunds a wallet
    /// payment in one transaction.
    pub async fn cancel(&self, id: i32, reason: Option<String>) -> DomainResult<CancelOutcome> {
        let outcome = self.repos.shipments().cancel(id, reason).await?;
        metrics::counter!("freight_shipments_cancelled_total").increment(1);
        info!(
            shipment_id = id,
            released = outcome.released.len(),
            refunded = outcome.refund.as_ref().map(|r| r.amount),
            "Shipment cancelled"
        );

        let refund_note = match &outcome.refund {
            Some(refund) => format!("; {} refunded to your wallet", refund.amount),
            None => String::new(),
        };
        self.notify(
            &outcome.shipment,
            "Shipment cancelled",
            format!(
                "Shipment #{} was cancelled and its packages returned to your warehouse stock{}",
                id, refund_note
            ),
        );
        Ok(outcome)
    }

    /// Staff rejection. Same effect as a cancellation, but a reason is required.
    pub async fn reject(&self, id: i32, reason: &str) -> DomainResult<CancelOutcome> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DomainError::Validation(
                "a reason is required to reject a shipment".into(),
            ));
        }
        self.cancel(id, Some(reason.to_string())).await
    }

    /// Void the shipment's issued invoice so it can be cancelled.
    pub async fn void_invoice(&self, id: i32, reason: &str) -> DomainResult<Shipment> {
        let shipment = self.get(id).await?;
        let invoice_ref = match (&shipment.invoice.status, &shipment.invoice.invoice_ref) {
            (InvoiceStatus::Issued, Some(invoice_ref)) => invoice_ref.clone(),
            _ => {
                return Err(DomainError::InvalidState {
                    entity: "Shipment",
                    id,
                    status: format!("invoice {}", shipment.invoice.status),
                    operation: "void invoice",
                })
            }
        };
        self.invoices
            .void(InvoiceTarget::Shipment(id), &invoice_ref, reason)
            .await?;
        self.get(id).await
    }

    pub async fn get(&self, id: i32) -> DomainResult<Shipment> {
        self.repos
            .shipments()
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Shipment", id))
    }

    pub async fn list_for_owner(&self, owner_user_id: i32) -> DomainResult<Vec<Shipment>> {
        self.repos.shipments().find_by_owner(owner_user_id).await
    }

    fn notify(&self, shipment: &Shipment, title: &str, message: String) {
        self.notifier.notify(
            Notification::new(
                shipment.owner_user_id,
                NotificationCategory::Shipment,
                title,
                message,
            )
            .with_link(format!("/shipments/{}", shipment.id)),
        );
    }
}
