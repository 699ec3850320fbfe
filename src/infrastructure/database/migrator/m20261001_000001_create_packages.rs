//! Create packages and package_boxes tables

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Packages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Packages::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Packages::OwnerUserId).integer().not_null())
                    .col(ColumnDef::new(Packages::TrackingNumber).string().not_null())
                    .col(ColumnDef::new(Packages::ProductName).string().not_null())
                    .col(
                        ColumnDef::new(Packages::Quantity)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(Packages::ImagePath).string())
                    .col(
                        ColumnDef::new(Packages::ComputedFee)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Packages::Status)
                            .string()
                            .not_null()
                            .default("Pending"),
                    )
                    .col(ColumnDef::new(Packages::ShipmentId).integer())
                    .col(
                        ColumnDef::new(Packages::Revision)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Packages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Packages::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Packages::ArrivedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_packages_tracking_number")
                    .table(Packages::Table)
                    .col(Packages::TrackingNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_packages_owner")
                    .table(Packages::Table)
                    .col(Packages::OwnerUserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_packages_shipment")
                    .table(Packages::Table)
                    .col(Packages::ShipmentId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PackageBoxes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PackageBoxes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PackageBoxes::PackageId).integer().not_null())
                    .col(ColumnDef::new(PackageBoxes::Position).integer().not_null())
                    .col(ColumnDef::new(PackageBoxes::Name).string().not_null())
                    .col(ColumnDef::new(PackageBoxes::CategoryKey).string().not_null())
                    .col(ColumnDef::new(PackageBoxes::BilledCategory).string().not_null())
                    .col(
                        ColumnDef::new(PackageBoxes::FellBack)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(PackageBoxes::WeightKg).string())
                    .col(ColumnDef::new(PackageBoxes::LengthCm).string())
                    .col(ColumnDef::new(PackageBoxes::WidthCm).string())
                    .col(ColumnDef::new(PackageBoxes::HeightCm).string())
                    .col(ColumnDef::new(PackageBoxes::Cbm).string())
                    .col(
                        ColumnDef::new(PackageBoxes::VolumetricUnits)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PackageBoxes::VolumeCost)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PackageBoxes::WeightCost)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PackageBoxes::Fee)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_package_boxes_package")
                            .from(PackageBoxes::Table, PackageBoxes::PackageId)
                            .to(Packages::Table, Packages::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_package_boxes_package")
                    .table(PackageBoxes::Table)
                    .col(PackageBoxes::PackageId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PackageBoxes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Packages::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Packages {
    Table,
    Id,
    OwnerUserId,
    TrackingNumber,
    ProductName,
    Quantity,
    ImagePath,
    ComputedFee,
    Status,
    ShipmentId,
    Revision,
    CreatedAt,
    UpdatedAt,
    ArrivedAt,
}

#[derive(Iden)]
pub enum PackageBoxes {
    Table,
    Id,
    PackageId,
    Position,
    Name,
    CategoryKey,
    BilledCategory,
    FellBack,
    WeightKg,
    LengthCm,
    WidthCm,
    HeightCm,
    Cbm,
    VolumetricUnits,
    VolumeCost,
    WeightCost,
    Fee,
}
