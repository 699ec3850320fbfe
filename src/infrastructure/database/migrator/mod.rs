//! Database migrations module

pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_packages;
mod m20261001_000002_create_shipments;
mod m20261001_000003_create_wallets;
mod m20261001_000004_add_invoice_claimed_at;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_packages::Migration),
            Box::new(m20261001_000002_create_shipments::Migration),
            Box::new(m20261001_000003_create_wallets::Migration),
            Box::new(m20261001_000004_add_invoice_claimed_at::Migration),
        ]
    }
}
