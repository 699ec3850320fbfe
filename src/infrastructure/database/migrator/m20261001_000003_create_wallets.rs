//! Create wallets and wallet_transactions tables

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Wallets::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Wallets::OwnerUserId).integer().not_null())
                    .col(
                        ColumnDef::new(Wallets::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Wallets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Wallets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // One wallet per user
        manager
            .create_index(
                Index::create()
                    .name("idx_wallets_owner")
                    .table(Wallets::Table)
                    .col(Wallets::OwnerUserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WalletTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WalletTransactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WalletTransactions::WalletId).integer().not_null())
                    .col(
                        ColumnDef::new(WalletTransactions::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WalletTransactions::TxType).string().not_null())
                    .col(
                        ColumnDef::new(WalletTransactions::Status)
                            .string()
                            .not_null()
                            .default("Pending"),
                    )
                    .col(ColumnDef::new(WalletTransactions::ProofRef).string())
                    .col(ColumnDef::new(WalletTransactions::Note).string())
                    .col(ColumnDef::new(WalletTransactions::ReviewReason).string())
                    .col(ColumnDef::new(WalletTransactions::ShipmentId).integer())
                    .col(
                        ColumnDef::new(WalletTransactions::InvoiceStatus)
                            .string()
                            .not_null()
                            .default("None"),
                    )
                    .col(ColumnDef::new(WalletTransactions::InvoiceRef).string())
                    .col(ColumnDef::new(WalletTransactions::InvoiceError).string())
                    .col(ColumnDef::new(WalletTransactions::InvoicedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(WalletTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WalletTransactions::ReviewedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wallet_transactions_wallet")
                            .from(WalletTransactions::Table, WalletTransactions::WalletId)
                            .to(Wallets::Table, Wallets::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_wallet_transactions_wallet")
                    .table(WalletTransactions::Table)
                    .col(WalletTransactions::WalletId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WalletTransactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Wallets {
    Table,
    Id,
    OwnerUserId,
    Balance,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum WalletTransactions {
    Table,
    Id,
    WalletId,
    Amount,
    TxType,
    Status,
    ProofRef,
    Note,
    ReviewReason,
    ShipmentId,
    InvoiceStatus,
    InvoiceRef,
    InvoiceError,
    InvoicedAt,
    CreatedAt,
    ReviewedAt,
}
