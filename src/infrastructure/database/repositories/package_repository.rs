//! SeaORM implementation of PackageRepository

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

use super::db_err;
use crate::domain::package::{NewPackage, Package, PackageRepository, PackageStatus};
use crate::domain::pricing::{BoxQuote, CargoBox, PricedBox};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{package, package_box};
use crate::shared::errors::{UnavailablePackage, UnavailableReason};

pub struct SeaOrmPackageRepository {
    db: DatabaseConnection,
}

impl SeaOrmPackageRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn decimal_to_column(value: Option<Decimal>) -> Option<String> {
    value.map(|d| d.normalize().to_string())
}

fn column_to_decimal(value: Option<String>) -> DomainResult<Option<Decimal>> {
    value
        .map(|s| {
            Decimal::from_str(&s)
                .map_err(|e| DomainError::Storage(format!("bad decimal column '{}': {}", s, e)))
        })
        .transpose()
}

fn priced_box_from_model(model: package_box::Model) -> DomainResult<PricedBox> {
    Ok(PricedBox {
        measurement: CargoBox {
            name: model.name,
            category_key: model.category_key,
            weight_kg: column_to_decimal(model.weight_kg)?,
            length_cm: column_to_decimal(model.length_cm)?,
            width_cm: column_to_decimal(model.width_cm)?,
            height_cm: column_to_decimal(model.height_cm)?,
            cbm: column_to_decimal(model.cbm)?,
        },
        quote: BoxQuote {
            billed_category: model.billed_category,
            fell_back: model.fell_back,
            volumetric_units: model.volumetric_units,
            volume_cost: model.volume_cost,
            weight_cost: model.weight_cost,
            fee: model.fee,
        },
    })
}

fn package_from_model(model: package::Model, boxes: Vec<package_box::Model>) -> DomainResult<Package> {
    let status = PackageStatus::from_str(&model.status).ok_or_else(|| {
        DomainError::Storage(format!("unknown package status '{}'", model.status))
    })?;
    Ok(Package {
        id: model.id,
        owner_user_id: model.owner_user_id,
        tracking_number: model.tracking_number,
        product_name: model.product_name,
        quantity: model.quantity,
        image_path: model.image_path,
        boxes: boxes
            .into_iter()
            .map(priced_box_from_model)
            .collect::<DomainResult<_>>()?,
        computed_fee: model.computed_fee,
        status,
        shipment_id: model.shipment_id,
        revision: model.revision,
        created_at: model.created_at,
        updated_at: model.updated_at,
        arrived_at: model.arrived_at,
    })
}

/// Load packages with their boxes, in the order the rows come back.
pub(crate) async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    models: Vec<package::Model>,
) -> DomainResult<Vec<Package>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
    let rows = package_box::Entity::find()
        .filter(package_box::Column::PackageId.is_in(ids))
        .order_by_asc(package_box::Column::Position)
        .all(conn)
        .await
        .map_err(db_err)?;

    let mut boxes: HashMap<i32, Vec<package_box::Model>> = HashMap::new();
    for row in rows {
        boxes.entry(row.package_id).or_default().push(row);
    }
    models
        .into_iter()
        .map(|model| {
            let own = boxes.remove(&model.id).unwrap_or_default();
            package_from_model(model, own)
        })
        .collect()
}

pub(crate) async fn load_package<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> DomainResult<Option<Package>> {
    let Some(model) = package::Entity::find_by_id(id).one(conn).await.map_err(db_err)? else {
        return Ok(None);
    };
    Ok(hydrate(conn, vec![model]).await?.pop())
}

async fn write_boxes<C: ConnectionTrait>(
    conn: &C,
    package_id: i32,
    boxes: &[PricedBox],
) -> DomainResult<()> {
    package_box::Entity::delete_many()
        .filter(package_box::Column::PackageId.eq(package_id))
        .exec(conn)
        .await
        .map_err(db_err)?;

    for (position, priced) in boxes.iter().enumerate() {
        let m = &priced.measurement;
        let q = &priced.quote;
        package_box::ActiveModel {
            id: NotSet,
            package_id: Set(package_id),
            position: Set(position as i32),
            name: Set(m.name.clone()),
            category_key: Set(m.category_key.clone()),
            billed_category: Set(q.billed_category.clone()),
            fell_back: Set(q.fell_back),
            weight_kg: Set(decimal_to_column(m.weight_kg)),
            length_cm: Set(decimal_to_column(m.length_cm)),
            width_cm: Set(decimal_to_column(m.width_cm)),
            height_cm: Set(decimal_to_column(m.height_cm)),
            cbm: Set(decimal_to_column(m.cbm)),
            volumetric_units: Set(q.volumetric_units),
            volume_cost: Set(q.volume_cost),
            weight_cost: Set(q.weight_cost),
            fee: Set(q.fee),
        }
        .insert(conn)
        .await
        .map_err(db_err)?;
    }
    Ok(())
}

/// Conditionally claim one package for a shipment. Returns false when the
/// package is missing, foreign, not `Arrived`, already claimed, or changed.
pub(crate) async fn claim_package<C: ConnectionTrait>(
    conn: &C,
    package_id: i32,
    owner_user_id: i32,
    expected_revision: i32,
    shipment_id: i32,
) -> DomainResult<bool> {
    let result = package::Entity::update_many()
        .col_expr(
            package::Column::Status,
            Expr::value(PackageStatus::InShipment.as_str()),
        )
        .col_expr(package::Column::ShipmentId, Expr::value(shipment_id))
        .col_expr(package::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(package::Column::Id.eq(package_id))
        .filter(package::Column::OwnerUserId.eq(owner_user_id))
        .filter(package::Column::Status.eq(PackageStatus::Arrived.as_str()))
        .filter(package::Column::ShipmentId.is_null())
        .filter(package::Column::Revision.eq(expected_revision))
        .exec(conn)
        .await
        .map_err(db_err)?;
    Ok(result.rows_affected == 1)
}

/// Return a claimed package to `Arrived` with no shipment.
///
/// Fails with `InvalidState` unless the package is `InShipment` for
/// `shipment_id`.
pub(crate) async fn release_package<C: ConnectionTrait>(
    conn: &C,
    package_id: i32,
    shipment_id: i32,
) -> DomainResult<()> {
    let result = package::Entity::update_many()
        .col_expr(
            package::Column::Status,
            Expr::value(PackageStatus::Arrived.as_str()),
        )
        .col_expr(package::Column::ShipmentId, Expr::value(Option::<i32>::None))
        .col_expr(package::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(package::Column::Id.eq(package_id))
        .filter(package::Column::ShipmentId.eq(shipment_id))
        .filter(package::Column::Status.eq(PackageStatus::InShipment.as_str()))
        .exec(conn)
        .await
        .map_err(db_err)?;

    if result.rows_affected == 1 {
        debug!("Released package {} from shipment {}", package_id, shipment_id);
        return Ok(());
    }
    match load_package(conn, package_id).await? {
        Some(p) => Err(DomainError::InvalidState {
            entity: "Package",
            id: p.id,
            status: p.status.to_string(),
            operation: "release",
        }),
        None => Err(DomainError::not_found("Package", package_id)),
    }
}

/// Move every package of a finished shipment to `Completed`.
pub(crate) async fn finalize_packages<C: ConnectionTrait>(
    conn: &C,
    shipment_id: i32,
) -> DomainResult<u64> {
    let result = package::Entity::update_many()
        .col_expr(
            package::Column::Status,
            Expr::value(PackageStatus::Completed.as_str()),
        )
        .col_expr(package::Column::ShipmentId, Expr::value(Option::<i32>::None))
        .col_expr(package::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(package::Column::ShipmentId.eq(shipment_id))
        .filter(package::Column::Status.eq(PackageStatus::InShipment.as_str()))
        .exec(conn)
        .await
        .map_err(db_err)?;
    Ok(result.rows_affected)
}

pub(crate) async fn packages_in_shipment<C: ConnectionTrait>(
    conn: &C,
    shipment_id: i32,
) -> DomainResult<Vec<Package>> {
    let models = package::Entity::find()
        .filter(package::Column::ShipmentId.eq(shipment_id))
        .order_by_asc(package::Column::Id)
        .all(conn)
        .await
        .map_err(db_err)?;
    hydrate(conn, models).await
}

/// Explain a missed conditional update on a package.
async fn stale_package<C: ConnectionTrait>(
    conn: &C,
    id: i32,
    check: impl FnOnce(&Package) -> Result<(), DomainError>,
) -> DomainError {
    match load_package(conn, id).await {
        Ok(Some(current)) => match check(&current) {
            Err(e) => e,
            Ok(()) => DomainError::PackageUnavailable(vec![UnavailablePackage {
                package_id: id,
                reason: UnavailableReason::Changed,
            }]),
        },
        Ok(None) => DomainError::not_found("Package", id),
        Err(e) => e,
    }
}

fn duplicate_or(tracking_number: &str, e: sea_orm::DbErr) -> DomainError {
    if matches!(e.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_))) {
        DomainError::DuplicateTrackingNumber(tracking_number.to_string())
    } else {
        db_err(e)
    }
}

// ── PackageRepository impl ──────────────────────────────────────

#[async_trait]
impl PackageRepository for SeaOrmPackageRepository {
    async fn insert(&self, new: NewPackage) -> DomainResult<Package> {
        debug!("Inserting package {}", new.tracking_number);
        let now = Utc::now();
        let model = package::ActiveModel {
            id: NotSet,
            owner_user_id: Set(new.owner_user_id),
            tracking_number: Set(new.tracking_number.clone()),
            product_name: Set(new.product_name),
            quantity: Set(new.quantity),
            image_path: Set(new.image_path),
            computed_fee: Set(0),
            status: Set(PackageStatus::Pending.as_str().to_string()),
            shipment_id: Set(None),
            revision: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            arrived_at: Set(None),
        }
        .insert(&self.db)
        .await
        .map_err(|e| duplicate_or(&new.tracking_number, e))?;

        package_from_model(model, Vec::new())
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Package>> {
        load_package(&self.db, id).await
    }

    async fn find_by_ids(&self, ids: &[i32]) -> DomainResult<Vec<Package>> {
        let models = package::Entity::find()
            .filter(package::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(package::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        hydrate(&self.db, models).await
    }

    async fn find_by_tracking_number(&self, tracking_number: &str) -> DomainResult<Option<Package>> {
        let Some(model) = package::Entity::find()
            .filter(package::Column::TrackingNumber.eq(tracking_number))
            .one(&self.db)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };
        Ok(hydrate(&self.db, vec![model]).await?.pop())
    }

    async fn find_by_owner(&self, owner_user_id: i32) -> DomainResult<Vec<Package>> {
        let models = package::Entity::find()
            .filter(package::Column::OwnerUserId.eq(owner_user_id))
            .order_by_desc(package::Column::CreatedAt)
            .order_by_desc(package::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        hydrate(&self.db, models).await
    }

    async fn find_by_shipment(&self, shipment_id: i32) -> DomainResult<Vec<Package>> {
        packages_in_shipment(&self.db, shipment_id).await
    }

    async fn save_measurement(&self, p: &Package, expected_revision: i32) -> DomainResult<()> {
        debug!(
            "Saving measurement for package {} (revision {} -> {})",
            p.id, expected_revision, p.revision
        );
        let txn = self.db.begin().await.map_err(db_err)?;

        let result = package::Entity::update_many()
            .col_expr(package::Column::Status, Expr::value(p.status.as_str()))
            .col_expr(package::Column::ComputedFee, Expr::value(p.computed_fee))
            .col_expr(package::Column::Revision, Expr::value(p.revision))
            .col_expr(package::Column::UpdatedAt, Expr::value(p.updated_at))
            .col_expr(package::Column::ArrivedAt, Expr::value(p.arrived_at))
            .filter(package::Column::Id.eq(p.id))
            .filter(package::Column::Revision.eq(expected_revision))
            .filter(package::Column::ShipmentId.is_null())
            .filter(package::Column::Status.is_in([
                PackageStatus::Pending.as_str(),
                PackageStatus::Arrived.as_str(),
            ]))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        if result.rows_affected != 1 {
            return Err(stale_package(&txn, p.id, Package::ensure_measurable).await);
        }

        write_boxes(&txn, p.id, &p.boxes).await?;
        txn.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn save_details(&self, p: &Package, expected_revision: i32) -> DomainResult<()> {
        debug!("Saving details for package {}", p.id);
        let result = package::Entity::update_many()
            .col_expr(
                package::Column::TrackingNumber,
                Expr::value(p.tracking_number.clone()),
            )
            .col_expr(package::Column::ProductName, Expr::value(p.product_name.clone()))
            .col_expr(package::Column::Quantity, Expr::value(p.quantity))
            .col_expr(package::Column::ImagePath, Expr::value(p.image_path.clone()))
            .col_expr(package::Column::Revision, Expr::value(p.revision))
            .col_expr(package::Column::UpdatedAt, Expr::value(p.updated_at))
            .filter(package::Column::Id.eq(p.id))
            .filter(package::Column::Revision.eq(expected_revision))
            .filter(package::Column::Status.eq(PackageStatus::Pending.as_str()))
            .exec(&self.db)
            .await
            .map_err(|e| duplicate_or(&p.tracking_number, e))?;

        if result.rows_affected != 1 {
            return Err(stale_package(&self.db, p.id, |c| c.ensure_pending("edit")).await);
        }
        Ok(())
    }

    async fn delete_pending(&self, id: i32) -> DomainResult<()> {
        debug!("Deleting pending package {}", id);
        let txn = self.db.begin().await.map_err(db_err)?;

        package_box::Entity::delete_many()
            .filter(package_box::Column::PackageId.eq(id))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        let result = package::Entity::delete_many()
            .filter(package::Column::Id.eq(id))
            .filter(package::Column::Status.eq(PackageStatus::Pending.as_str()))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        if result.rows_affected != 1 {
            return Err(stale_package(&txn, id, |c| c.ensure_pending("delete")).await);
        }
        txn.commit().await.map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_db;
    use rust_decimal_macros::dec;

    fn forecast(tracking: &str) -> NewPackage {
        NewPackage {
            owner_user_id: 7,
            tracking_number: tracking.into(),
            product_name: "Shoes".into(),
            quantity: 1,
            image_path: None,
        }
    }

    fn priced(fee: i64) -> PricedBox {
        PricedBox {
            measurement: CargoBox {
                name: "box".into(),
                category_key: "general".into(),
                weight_kg: Some(dec!(12.5)),
                length_cm: Some(dec!(50)),
                width_cm: Some(dec!(40)),
                height_cm: Some(dec!(30)),
                cbm: None,
            },
            quote: BoxQuote {
                billed_category: "general".into(),
                fell_back: false,
                volumetric_units: 3,
                volume_cost: fee,
                weight_cost: 0,
                fee,
            },
        }
    }

    #[tokio::test]
    async fn duplicate_tracking_number_is_rejected() {
        let repo = SeaOrmPackageRepository::new(memory_db().await);
        repo.insert(forecast("TN-1")).await.unwrap();
        let err = repo.insert(forecast("TN-1")).await.unwrap_err();
        assert!(matches!(err, DomainError::DuplicateTrackingNumber(t) if t == "TN-1"));
    }

    #[tokio::test]
    async fn measurement_round_trips_decimals_and_quotes() {
        let repo = SeaOrmPackageRepository::new(memory_db().await);
        let mut p = repo.insert(forecast("TN-2")).await.unwrap();
        let revision = p.revision;
        p.apply_measurement(vec![priced(375), priced(250)]).unwrap();
        repo.save_measurement(&p, revision).await.unwrap();

        let stored = repo.find_by_id(p.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PackageStatus::Arrived);
        assert_eq!(stored.computed_fee, 625);
        assert_eq!(stored.boxes.len(), 2);
        assert_eq!(stored.boxes[0].measurement.weight_kg, Some(dec!(12.5)));
        assert_eq!(stored.boxes[1].quote.fee, 250);
        assert_eq!(stored.revision, revision + 1);
    }

    #[tokio::test]
    async fn stale_revision_is_rejected() {
        let repo = SeaOrmPackageRepository::new(memory_db().await);
        let mut p = repo.insert(forecast("TN-3")).await.unwrap();
        p.apply_measurement(vec![priced(100)]).unwrap();
        repo.save_measurement(&p, 0).await.unwrap();

        // second writer still holds revision 0
        let err = repo.save_measurement(&p, 0).await.unwrap_err();
        assert!(matches!(err, DomainError::PackageUnavailable(_)));
    }

    #[tokio::test]
    async fn only_pending_packages_are_deleted() {
        let repo = SeaOrmPackageRepository::new(memory_db().await);
        let pending = repo.insert(forecast("TN-4")).await.unwrap();
        repo.delete_pending(pending.id).await.unwrap();
        assert!(repo.find_by_id(pending.id).await.unwrap().is_none());

        let mut arrived = repo.insert(forecast("TN-5")).await.unwrap();
        arrived.apply_measurement(vec![priced(100)]).unwrap();
        repo.save_measurement(&arrived, 0).await.unwrap();
        let err = repo.delete_pending(arrived.id).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
        assert!(repo.find_by_id(arrived.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn release_requires_in_shipment() {
        let db = memory_db().await;
        let repo = SeaOrmPackageRepository::new(db.clone());
        let p = repo.insert(forecast("TN-6")).await.unwrap();
        let err = release_package(&db, p.id, 1).await.unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { operation: "release", .. }));
    }
}
