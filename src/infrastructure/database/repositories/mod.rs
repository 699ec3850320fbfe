//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod invoice_ledger;
pub mod package_repository;
pub mod repository_provider;
pub mod shipment_repository;
pub mod wallet_repository;

pub use repository_provider::SeaOrmRepositoryProvider;

use chrono::{DateTime, Utc};

use crate::domain::invoice::{InvoiceRecord, InvoiceStatus};
use crate::domain::{DomainError, DomainResult};

fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}

fn invoice_record(
    status: &str,
    invoice_ref: Option<String>,
    issued_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
) -> DomainResult<InvoiceRecord> {
    let status = InvoiceStatus::from_str(status)
        .ok_or_else(|| DomainError::Storage(format!("unknown invoice status '{}'", status)))?;
    Ok(InvoiceRecord {
        status,
        invoice_ref,
        issued_at,
        last_error,
    })
}
