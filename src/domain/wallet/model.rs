//! Wallet domain entities

use chrono::{DateTime, Utc};

use crate::domain::invoice::{InvoiceRecord, Invoiceable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    /// Customer top-up, needs staff review
    Deposit,
    /// Shipment paid from the wallet
    Payment,
    /// Return of a shipment payment
    Refund,
    /// Staff correction, applied immediately
    Adjust,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "Deposit",
            Self::Payment => "Payment",
            Self::Refund => "Refund",
            Self::Adjust => "Adjust",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Deposit" => Some(Self::Deposit),
            "Payment" => Some(Self::Payment),
            "Refund" => Some(Self::Refund),
            "Adjust" => Some(Self::Adjust),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Rejected,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Rejected => "Rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(Self::Pending),
            "Completed" => Some(Self::Completed),
            "Rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub fn resulting_status(&self) -> TransactionStatus {
        match self {
            Self::Approve => TransactionStatus::Completed,
            Self::Reject => TransactionStatus::Rejected,
        }
    }
}

/// Customer wallet; `balance` equals the sum of its completed transactions.
#[derive(Debug, Clone)]
pub struct Wallet {
    pub id: i32,
    pub owner_user_id: i32,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct WalletTransaction {
    pub id: i32,
    pub wallet_id: i32,
    /// Signed amount in the smallest currency unit
    pub amount: i64,
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    /// Opaque file store reference to the transfer proof
    pub proof_ref: Option<String>,
    pub note: Option<String>,
    pub review_reason: Option<String>,
    pub shipment_id: Option<i32>,
    pub invoice: InvoiceRecord,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl Invoiceable for WalletTransaction {
    type Status = TransactionStatus;

    fn invoice(&self) -> &InvoiceRecord {
        &self.invoice
    }

    /// Approved deposits get a receipt invoice.
    fn requires_invoice(&self, previous: TransactionStatus, next: TransactionStatus) -> bool {
        self.tx_type == TransactionType::Deposit
            && self.amount > 0
            && previous == TransactionStatus::Pending
            && next == TransactionStatus::Completed
    }
}

/// Balance compared with the ledger it is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerAudit {
    pub wallet_id: i32,
    pub balance: i64,
    pub completed_total: i64,
}

impl LedgerAudit {
    pub fn is_consistent(&self) -> bool {
        self.balance == self.completed_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invoice::should_issue;

    fn tx(tx_type: TransactionType, amount: i64) -> WalletTransaction {
        WalletTransaction {
            id: 1,
            wallet_id: 1,
            amount,
            tx_type,
            status: TransactionStatus::Pending,
            proof_ref: None,
            note: None,
            review_reason: None,
            shipment_id: None,
            invoice: InvoiceRecord::default(),
            created_at: Utc::now(),
            reviewed_at: None,
        }
    }

    #[test]
    fn approved_deposit_requires_invoice() {
        let t = tx(TransactionType::Deposit, 5000);
        assert!(should_issue(&t, TransactionStatus::Pending, TransactionStatus::Completed));
        assert!(!should_issue(&t, TransactionStatus::Pending, TransactionStatus::Rejected));
    }

    #[test]
    fn adjustments_are_not_invoiced() {
        let t = tx(TransactionType::Adjust, 5000);
        assert!(!should_issue(&t, TransactionStatus::Pending, TransactionStatus::Completed));
    }

    #[test]
    fn decision_maps_to_status() {
        assert_eq!(ReviewDecision::Approve.resulting_status(), TransactionStatus::Completed);
        assert_eq!(ReviewDecision::Reject.resulting_status(), TransactionStatus::Rejected);
    }

    #[test]
    fn audit_consistency() {
        let audit = LedgerAudit {
            wallet_id: 1,
            balance: 300,
            completed_total: 300,
        };
        assert!(audit.is_consistent());
        assert!(!LedgerAudit {
            completed_total: 200,
            ..audit
        }
        .is_consistent());
    }
}
