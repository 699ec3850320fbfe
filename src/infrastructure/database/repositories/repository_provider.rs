//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::invoice::InvoiceLedger;
use crate::domain::package::PackageRepository;
use crate::domain::repositories::RepositoryProvider;
use crate::domain::shipment::ShipmentRepository;
use crate::domain::wallet::WalletRepository;

use super::invoice_ledger::SeaOrmInvoiceLedger;
use super::package_repository::SeaOrmPackageRepository;
use super::shipment_repository::SeaOrmShipmentRepository;
use super::wallet_repository::SeaOrmWalletRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let package = repos.packages().find_by_id(12).await?;
/// let wallet = repos.wallets().ensure(42).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    packages: SeaOrmPackageRepository,
    shipments: SeaOrmShipmentRepository,
    wallets: SeaOrmWalletRepository,
    invoices: SeaOrmInvoiceLedger,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            packages: SeaOrmPackageRepository::new(db.clone()),
            shipments: SeaOrmShipmentRepository::new(db.clone()),
            wallets: SeaOrmWalletRepository::new(db.clone()),
            invoices: SeaOrmInvoiceLedger::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn packages(&self) -> &dyn PackageRepository {
        &self.packages
    }

    fn shipments(&self) -> &dyn ShipmentRepository {
        &self.shipments
    }

    fn wallets(&self) -> &dyn WalletRepository {
        &self.wallets
    }

    fn invoices(&self) -> &dyn InvoiceLedger {
        &self.invoices
    }
}
