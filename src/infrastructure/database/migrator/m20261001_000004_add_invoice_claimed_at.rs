//! Record when an invoice issuance was claimed, so abandoned claims expire

use sea_orm_migration::prelude::*;

use super::m20261001_000002_create_shipments::Shipments;
use super::m20261001_000003_create_wallets::WalletTransactions;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Shipments::Table)
                    .add_column(
                        ColumnDef::new(InvoiceClaim::InvoiceClaimedAt).timestamp_with_time_zone(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(WalletTransactions::Table)
                    .add_column(
                        ColumnDef::new(InvoiceClaim::InvoiceClaimedAt).timestamp_with_time_zone(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
        // SQLite cannot drop columns; the nullable column is left in place
        Ok(())
    }
}

#[derive(Iden)]
enum InvoiceClaim {
    InvoiceClaimedAt,
}
