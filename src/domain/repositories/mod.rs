//! Repository access for the domain layer
//!
//! Contains:
//! - `RepositoryProvider`: unified access to all per-aggregate repositories
//! - `DomainResult`: standard result type for domain operations

use super::invoice::InvoiceLedger;
use super::package::PackageRepository;
use super::shipment::ShipmentRepository;
use super::wallet::WalletRepository;
use crate::shared::errors::DomainError;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Provides access to all domain repositories.
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider) {
///     let package = repos.packages().find_by_tracking_number("TN-001").await?;
///     let wallet = repos.wallets().ensure(42).await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn packages(&self) -> &dyn PackageRepository;
    fn shipments(&self) -> &dyn ShipmentRepository;
    fn wallets(&self) -> &dyn WalletRepository;
    fn invoices(&self) -> &dyn InvoiceLedger;
}
