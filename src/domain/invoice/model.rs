//! Invoice bookkeeping carried by invoiceable entities

use chrono::{DateTime, Utc};

/// Invoice status tracked on a shipment or wallet transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvoiceStatus {
    /// No invoice requested yet
    #[default]
    None,
    /// Claimed by an issuer; provider call in flight
    Issuing,
    Issued,
    /// Last attempt failed; eligible for retry
    Failed,
    Voided,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Issuing => "Issuing",
            Self::Issued => "Issued",
            Self::Failed => "Failed",
            Self::Voided => "Voided",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "None" => Some(Self::None),
            "Issuing" => Some(Self::Issuing),
            "Issued" => Some(Self::Issued),
            "Failed" => Some(Self::Failed),
            "Voided" => Some(Self::Voided),
            _ => None,
        }
    }

    /// Statuses from which an issuance may be claimed.
    pub fn claimable() -> [Self; 2] {
        [Self::None, Self::Failed]
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity an invoice is issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvoiceTarget {
    Shipment(i32),
    WalletTransaction(i32),
}

impl InvoiceTarget {
    /// Stable key handed to the provider so a repeated request is recognised.
    pub fn idempotency_key(&self) -> String {
        match self {
            Self::Shipment(id) => format!("shipment-{}", id),
            Self::WalletTransaction(id) => format!("wallet-tx-{}", id),
        }
    }
}

impl std::fmt::Display for InvoiceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shipment(id) => write!(f, "shipment {}", id),
            Self::WalletTransaction(id) => write!(f, "wallet transaction {}", id),
        }
    }
}

/// Invoice columns shared by shipments and wallet transactions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceRecord {
    pub status: InvoiceStatus,
    pub invoice_ref: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl InvoiceRecord {
    /// An invoice exists (or is being created) and must not be requested again.
    pub fn is_taken(&self) -> bool {
        self.invoice_ref.is_some() || self.status == InvoiceStatus::Issuing
    }
}
