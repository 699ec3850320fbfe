//! Create shipments and shipment_items tables

use sea_orm_migration::prelude::*;

use super::m20261001_000001_create_packages::Packages;

#[derive(DeriveMigrationName)]
pub struct Migration;

fn fee(col: Shipments) -> ColumnDef {
    ColumnDef::new(col).big_integer().not_null().default(0).to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Shipments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Shipments::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Shipments::OwnerUserId).integer().not_null())
                    .col(ColumnDef::new(Shipments::RecipientName).string().not_null())
                    .col(ColumnDef::new(Shipments::RecipientPhone).string().not_null())
                    .col(ColumnDef::new(Shipments::RecipientAddress).string().not_null())
                    .col(fee(Shipments::BaseFee))
                    .col(
                        ColumnDef::new(Shipments::MinimumApplied)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(fee(Shipments::OversizedFee))
                    .col(fee(Shipments::OverweightFee))
                    .col(fee(Shipments::RemoteAreaFee))
                    .col(fee(Shipments::TotalFee))
                    .col(fee(Shipments::RemoteAreaRate))
                    .col(fee(Shipments::TotalVolumetricUnits))
                    .col(ColumnDef::new(Shipments::RateVersion).string().not_null())
                    .col(
                        ColumnDef::new(Shipments::Status)
                            .string()
                            .not_null()
                            .default("PendingPayment"),
                    )
                    .col(
                        ColumnDef::new(Shipments::InvoiceStatus)
                            .string()
                            .not_null()
                            .default("None"),
                    )
                    .col(ColumnDef::new(Shipments::InvoiceRef).string())
                    .col(ColumnDef::new(Shipments::InvoiceError).string())
                    .col(ColumnDef::new(Shipments::InvoicedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Shipments::PaymentTransactionId).integer())
                    .col(ColumnDef::new(Shipments::CancelReason).string())
                    .col(
                        ColumnDef::new(Shipments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Shipments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_shipments_owner")
                    .table(Shipments::Table)
                    .col(Shipments::OwnerUserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ShipmentItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ShipmentItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ShipmentItems::ShipmentId).integer().not_null())
                    .col(ColumnDef::new(ShipmentItems::PackageId).integer().not_null())
                    .col(
                        ColumnDef::new(ShipmentItems::PackageRevision)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ShipmentItems::Fee)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shipment_items_shipment")
                            .from(ShipmentItems::Table, ShipmentItems::ShipmentId)
                            .to(Shipments::Table, Shipments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shipment_items_package")
                            .from(ShipmentItems::Table, ShipmentItems::PackageId)
                            .to(Packages::Table, Packages::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_shipment_items_shipment")
                    .table(ShipmentItems::Table)
                    .col(ShipmentItems::ShipmentId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ShipmentItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Shipments::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Shipments {
    Table,
    Id,
    OwnerUserId,
    RecipientName,
    RecipientPhone,
    RecipientAddress,
    BaseFee,
    MinimumApplied,
    OversizedFee,
    OverweightFee,
    RemoteAreaFee,
    TotalFee,
    RemoteAreaRate,
    TotalVolumetricUnits,
    RateVersion,
    Status,
    InvoiceStatus,
    InvoiceRef,
    InvoiceError,
    InvoicedAt,
    PaymentTransactionId,
    CancelReason,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum ShipmentItems {
    Table,
    Id,
    ShipmentId,
    PackageId,
    PackageRevision,
    Fee,
}
