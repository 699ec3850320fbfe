//! Shipment domain entity

use chrono::{DateTime, Utc};

use crate::domain::invoice::{InvoiceRecord, InvoiceStatus, Invoiceable};
use crate::domain::pricing::ShipmentQuote;
use crate::domain::wallet::WalletTransaction;
use crate::shared::errors::DomainError;

/// Shipment lifecycle status
///
/// ```text
/// PendingPayment -> Processing -> Shipped -> Completed
/// PendingPayment | Processing -> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShipmentStatus {
    PendingPayment,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "PendingPayment",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PendingPayment" => Some(Self::PendingPayment),
            "Processing" => Some(Self::Processing),
            "Shipped" => Some(Self::Shipped),
            "Completed" => Some(Self::Completed),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: ShipmentStatus) -> bool {
        use ShipmentStatus::*;
        matches!(
            (self, next),
            (PendingPayment, Processing)
                | (Processing, Shipped)
                | (Shipped, Completed)
                | (PendingPayment, Cancelled)
                | (Processing, Cancelled)
        )
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientInfo {
    pub name: String,
    pub phone: String,
    pub address: String,
}

/// A package as it entered a shipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentMember {
    pub package_id: i32,
    /// Package revision the quote was computed from
    pub revision: i32,
    pub fee: i64,
}

/// Everything needed to create a shipment and claim its packages.
#[derive(Debug, Clone)]
pub struct NewShipment {
    pub owner_user_id: i32,
    pub recipient: RecipientInfo,
    pub members: Vec<ShipmentMember>,
    pub quote: ShipmentQuote,
    pub rate_version: String,
}

#[derive(Debug, Clone)]
pub struct Shipment {
    pub id: i32,
    pub owner_user_id: i32,
    /// Packages included at creation, kept after release for history
    pub package_ids: Vec<i32>,
    pub recipient: RecipientInfo,
    pub base_fee: i64,
    pub minimum_applied: bool,
    pub oversized_fee: i64,
    pub overweight_fee: i64,
    pub remote_area_fee: i64,
    pub total_fee: i64,
    pub remote_area_rate: i64,
    pub total_volumetric_units: i64,
    /// Rate table version the quote was computed under
    pub rate_version: String,
    pub status: ShipmentStatus,
    pub invoice: InvoiceRecord,
    /// Wallet payment that settled this shipment, if paid from the wallet
    pub payment_transaction_id: Option<i32>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    fn invalid(&self, operation: &'static str) -> DomainError {
        DomainError::InvalidState {
            entity: "Shipment",
            id: self.id,
            status: self.status.to_string(),
            operation,
        }
    }

    pub fn ensure_transition(&self, next: ShipmentStatus) -> Result<(), DomainError> {
        if next == ShipmentStatus::Cancelled {
            return self.ensure_cancellable();
        }
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(self.invalid(match next {
                ShipmentStatus::Processing => "start processing",
                ShipmentStatus::Shipped => "ship",
                ShipmentStatus::Completed => "complete",
                _ => "move",
            }))
        }
    }

    /// Cancellation needs an open, unpaid-or-processing shipment with no live
    /// invoice.
    pub fn ensure_cancellable(&self) -> Result<(), DomainError> {
        if !self.status.can_transition_to(ShipmentStatus::Cancelled) {
            return Err(self.invalid("cancel"));
        }
        match self.invoice.status {
            InvoiceStatus::Issued | InvoiceStatus::Issuing => {
                Err(DomainError::InvoiceOutstanding(self.id))
            }
            _ => Ok(()),
        }
    }

    pub fn quote(&self) -> ShipmentQuote {
        ShipmentQuote {
            base_fee: self.base_fee,
            minimum_applied: self.minimum_applied,
            oversized_fee: self.oversized_fee,
            overweight_fee: self.overweight_fee,
            remote_area_fee: self.remote_area_fee,
            total_fee: self.total_fee,
            total_volumetric_units: self.total_volumetric_units,
            remote_area_rate: self.remote_area_rate,
        }
    }
}

impl Invoiceable for Shipment {
    type Status = ShipmentStatus;

    fn invoice(&self) -> &InvoiceRecord {
        &self.invoice
    }

    /// Entering Processing bills the shipment. Later forward moves retry a
    /// missing invoice so no chargeable shipment leaves Processing unbilled.
    fn requires_invoice(&self, previous: ShipmentStatus, next: ShipmentStatus) -> bool {
        self.total_fee > 0
            && previous != next
            && matches!(
                next,
                ShipmentStatus::Processing | ShipmentStatus::Shipped | ShipmentStatus::Completed
            )
    }
}

/// Result of an atomic cancellation.
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    pub shipment: Shipment,
    /// Packages returned to `Arrived`
    pub released: Vec<i32>,
    /// Refund credited when the shipment had been paid from the wallet
    pub refund: Option<WalletTransaction>,
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invoice::should_issue;

    fn sample(status: ShipmentStatus, total_fee: i64) -> Shipment {
        Shipment {
            id: 5,
            owner_user_id: 7,
            package_ids: vec![1, 2],
            recipient: RecipientInfo::default(),
            base_fee: total_fee,
            minimum_applied: false,
            oversized_fee: 0,
            overweight_fee: 0,
            remote_area_fee: 0,
            total_fee,
            remote_area_rate: 0,
            total_volumetric_units: 10,
            rate_version: "v".into(),
            status,
            invoice: InvoiceRecord::default(),
            payment_transaction_id: None,
            cancel_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn state_machine_edges() {
        use ShipmentStatus::*;
        assert!(PendingPayment.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Shipped));
        assert!(Shipped.can_transition_to(Completed));
        assert!(PendingPayment.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Cancelled));

        assert!(!PendingPayment.can_transition_to(Shipped));
        assert!(!PendingPayment.can_transition_to(Completed));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Cancelled));
    }

    #[test]
    fn cannot_skip_processing() {
        let s = sample(ShipmentStatus::PendingPayment, 2000);
        assert!(matches!(
            s.ensure_transition(ShipmentStatus::Shipped),
            Err(DomainError::InvalidState { .. })
        ));
    }

    #[test]
    fn issued_invoice_blocks_cancel() {
        let mut s = sample(ShipmentStatus::Processing, 2000);
        s.invoice.status = InvoiceStatus::Issued;
        s.invoice.invoice_ref = Some("INV-9".into());
        assert!(matches!(
            s.ensure_cancellable(),
            Err(DomainError::InvoiceOutstanding(5))
        ));

        s.invoice.status = InvoiceStatus::Voided;
        assert!(s.ensure_cancellable().is_ok());
    }

    #[test]
    fn processing_triggers_invoice_once() {
        let mut s = sample(ShipmentStatus::PendingPayment, 2000);
        assert!(should_issue(&s, ShipmentStatus::PendingPayment, ShipmentStatus::Processing));
        assert!(!should_issue(&s, ShipmentStatus::Processing, ShipmentStatus::Processing));

        s.invoice.invoice_ref = Some("INV-1".into());
        s.invoice.status = InvoiceStatus::Issued;
        assert!(!should_issue(&s, ShipmentStatus::PendingPayment, ShipmentStatus::Processing));
        assert!(!should_issue(&s, ShipmentStatus::Processing, ShipmentStatus::Shipped));
    }

    #[test]
    fn free_shipment_is_not_invoiced() {
        let s = sample(ShipmentStatus::PendingPayment, 0);
        assert!(!should_issue(&s, ShipmentStatus::PendingPayment, ShipmentStatus::Processing));
    }

    #[test]
    fn cancellation_never_invoices() {
        let s = sample(ShipmentStatus::Processing, 2000);
        assert!(!should_issue(&s, ShipmentStatus::Processing, ShipmentStatus::Cancelled));
    }
}
