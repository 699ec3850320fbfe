//! SeaORM implementation of ShipmentRepository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

use super::package_repository::{
    claim_package, finalize_packages, load_package, packages_in_shipment, release_package,
};
use super::wallet_repository::{
    apply_to_balance, insert_completed, load_transaction, wallet_by_owner,
};
use super::{db_err, invoice_record};
use crate::domain::invoice::InvoiceStatus;
use crate::domain::shipment::{
    CancelOutcome, NewShipment, RecipientInfo, Shipment, ShipmentRepository, ShipmentStatus,
};
use crate::domain::wallet::{TransactionType, WalletTransaction};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{shipment, shipment_item};
use crate::shared::errors::{UnavailablePackage, UnavailableReason};

pub struct SeaOrmShipmentRepository {
    db: DatabaseConnection,
}

impl SeaOrmShipmentRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn shipment_from_model(model: shipment::Model, package_ids: Vec<i32>) -> DomainResult<Shipment> {
    let status = ShipmentStatus::from_str(&model.status).ok_or_else(|| {
        DomainError::Storage(format!("unknown shipment status '{}'", model.status))
    })?;
    Ok(Shipment {
        id: model.id,
        owner_user_id: model.owner_user_id,
        package_ids,
        recipient: RecipientInfo {
            name: model.recipient_name,
            phone: model.recipient_phone,
            address: model.recipient_address,
        },
        base_fee: model.base_fee,
        minimum_applied: model.minimum_applied,
        oversized_fee: model.oversized_fee,
        overweight_fee: model.overweight_fee,
        remote_area_fee: model.remote_area_fee,
        total_fee: model.total_fee,
        remote_area_rate: model.remote_area_rate,
        total_volumetric_units: model.total_volumetric_units,
        rate_version: model.rate_version,
        status,
        invoice: invoice_record(
            &model.invoice_status,
            model.invoice_ref,
            model.invoiced_at,
            model.invoice_error,
        )?,
        payment_transaction_id: model.payment_transaction_id,
        cancel_reason: model.cancel_reason,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    models: Vec<shipment::Model>,
) -> DomainResult<Vec<Shipment>> {
    if models.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = models.iter().map(|m| m.id).collect();
    let items = shipment_item::Entity::find()
        .filter(shipment_item::Column::ShipmentId.is_in(ids))
        .order_by_asc(shipment_item::Column::Id)
        .all(conn)
        .await
        .map_err(db_err)?;

    let mut members: HashMap<i32, Vec<i32>> = HashMap::new();
    for item in items {
        members.entry(item.shipment_id).or_default().push(item.package_id);
    }
    models
        .into_iter()
        .map(|model| {
            let package_ids = members.remove(&model.id).unwrap_or_default();
            shipment_from_model(model, package_ids)
        })
        .collect()
}

async fn load_shipment<C: ConnectionTrait>(conn: &C, id: i32) -> DomainResult<Shipment> {
    let model = shipment::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(db_err)?
        .ok_or_else(|| DomainError::not_found("Shipment", id))?;
    hydrate(conn, vec![model])
        .await?
        .pop()
        .ok_or_else(|| DomainError::not_found("Shipment", id))
}

/// Conditionally move a shipment out of `from`; a miss means another writer
/// got there first.
async fn set_status<C: ConnectionTrait>(
    conn: &C,
    current: &Shipment,
    to: ShipmentStatus,
    operation: &'static str,
) -> DomainResult<()> {
    let result = shipment::Entity::update_many()
        .col_expr(shipment::Column::Status, Expr::value(to.as_str()))
        .col_expr(shipment::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(shipment::Column::Id.eq(current.id))
        .filter(shipment::Column::Status.eq(current.status.as_str()))
        .exec(conn)
        .await
        .map_err(db_err)?;
    if result.rows_affected == 1 {
        return Ok(());
    }
    let latest = load_shipment(conn, current.id).await?;
    Err(DomainError::InvalidState {
        entity: "Shipment",
        id: latest.id,
        status: latest.status.to_string(),
        operation,
    })
}

/// Reason a member claim missed, read inside the claiming transaction.
async fn unavailable_reason<C: ConnectionTrait>(
    conn: &C,
    package_id: i32,
    owner_user_id: i32,
) -> DomainResult<UnavailableReason> {
    Ok(match load_package(conn, package_id).await? {
        None => UnavailableReason::NotFound,
        Some(p) => p
            .unavailable_reason(owner_user_id)
            .unwrap_or(UnavailableReason::Changed),
    })
}

// ── ShipmentRepository impl ─────────────────────────────────────

#[async_trait]
impl ShipmentRepository for SeaOrmShipmentRepository {
    async fn create(&self, new: NewShipment) -> DomainResult<Shipment> {
        debug!(
            "Creating shipment for user {} with {} packages",
            new.owner_user_id,
            new.members.len()
        );
        let txn = self.db.begin().await.map_err(db_err)?;
        let now = Utc::now();
        let q = &new.quote;

        let model = shipment::ActiveModel {
            id: NotSet,
            owner_user_id: Set(new.owner_user_id),
            recipient_name: Set(new.recipient.name.clone()),
            recipient_phone: Set(new.recipient.phone.clone()),
            recipient_address: Set(new.recipient.address.clone()),
            base_fee: Set(q.base_fee),
            minimum_applied: Set(q.minimum_applied),
            oversized_fee: Set(q.oversized_fee),
            overweight_fee: Set(q.overweight_fee),
            remote_area_fee: Set(q.remote_area_fee),
            total_fee: Set(q.total_fee),
            remote_area_rate: Set(q.remote_area_rate),
            total_volumetric_units: Set(q.total_volumetric_units),
            rate_version: Set(new.rate_version.clone()),
            status: Set(ShipmentStatus::PendingPayment.as_str().to_string()),
            invoice_status: Set(InvoiceStatus::None.as_str().to_string()),
            invoice_ref: Set(None),
            invoice_error: Set(None),
            invoiced_at: Set(None),
            invoice_claimed_at: Set(None),
            payment_transaction_id: Set(None),
            cancel_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(db_err)?;

        // Attempt every claim so the error lists all offenders at once.
        let mut missed = Vec::new();
        for member in &new.members {
            let claimed = claim_package(
                &txn,
                member.package_id,
                new.owner_user_id,
                member.revision,
                model.id,
            )
            .await?;
            if !claimed {
                missed.push(member.package_id);
            }
        }

        if !missed.is_empty() {
            let mut unavailable = Vec::with_capacity(missed.len());
            for package_id in missed {
                unavailable.push(UnavailablePackage {
                    package_id,
                    reason: unavailable_reason(&txn, package_id, new.owner_user_id).await?,
                });
            }
            txn.rollback().await.map_err(db_err)?;
            return Err(DomainError::PackageUnavailable(unavailable));
        }

        for member in &new.members {
            shipment_item::ActiveModel {
                id: NotSet,
                shipment_id: Set(model.id),
                package_id: Set(member.package_id),
                package_revision: Set(member.revision),
                fee: Set(member.fee),
            }
            .insert(&txn)
            .await
            .map_err(db_err)?;
        }

        let created = load_shipment(&txn, model.id).await?;
        txn.commit().await.map_err(db_err)?;
        Ok(created)
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Shipment>> {
        match load_shipment(&self.db, id).await {
            Ok(s) => Ok(Some(s)),
            Err(DomainError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn find_by_owner(&self, owner_user_id: i32) -> DomainResult<Vec<Shipment>> {
        let models = shipment::Entity::find()
            .filter(shipment::Column::OwnerUserId.eq(owner_user_id))
            .order_by_desc(shipment::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?;
        hydrate(&self.db, models).await
    }

    async fn transition(
        &self,
        id: i32,
        from: ShipmentStatus,
        to: ShipmentStatus,
    ) -> DomainResult<Shipment> {
        debug!("Shipment {}: {} -> {}", id, from, to);
        if to == ShipmentStatus::Cancelled || !from.can_transition_to(to) {
            return Err(DomainError::Validation(format!(
                "illegal shipment transition {} -> {}",
                from, to
            )));
        }

        let txn = self.db.begin().await.map_err(db_err)?;
        let current = load_shipment(&txn, id).await?;
        if current.status != from {
            return Err(DomainError::InvalidState {
                entity: "Shipment",
                id,
                status: current.status.to_string(),
                operation: "move",
            });
        }
        set_status(&txn, &current, to, "move").await?;

        if to == ShipmentStatus::Completed {
            let finalized = finalize_packages(&txn, id).await?;
            debug!("Finalized {} packages of shipment {}", finalized, id);
        }

        let updated = load_shipment(&txn, id).await?;
        txn.commit().await.map_err(db_err)?;
        Ok(updated)
    }

    async fn cancel(&self, id: i32, reason: Option<String>) -> DomainResult<CancelOutcome> {
        debug!("Cancelling shipment {}", id);
        let txn = self.db.begin().await.map_err(db_err)?;

        let current = load_shipment(&txn, id).await?;
        current.ensure_cancellable()?;

        // Re-checked in the update itself: an invoice claimed after the read
        // above must block the cancellation.
        let outstanding = [InvoiceStatus::Issuing.as_str(), InvoiceStatus::Issued.as_str()];
        let result = shipment::Entity::update_many()
            .col_expr(
                shipment::Column::Status,
                Expr::value(ShipmentStatus::Cancelled.as_str()),
            )
            .col_expr(shipment::Column::CancelReason, Expr::value(reason))
            .col_expr(shipment::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(shipment::Column::Id.eq(id))
            .filter(shipment::Column::Status.eq(current.status.as_str()))
            .filter(shipment::Column::InvoiceStatus.is_not_in(outstanding))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if result.rows_affected != 1 {
            let latest = load_shipment(&txn, id).await?;
            latest.ensure_cancellable()?;
            return Err(DomainError::InvalidState {
                entity: "Shipment",
                id,
                status: latest.status.to_string(),
                operation: "cancel",
            });
        }

        let members = packages_in_shipment(&txn, id).await?;
        let mut released = Vec::with_capacity(members.len());
        for package in members {
            release_package(&txn, package.id, id).await?;
            released.push(package.id);
        }

        let refund = match current.payment_transaction_id {
            Some(payment_id) => {
                let payment = load_transaction(&txn, payment_id)
                    .await?
                    .ok_or_else(|| DomainError::not_found("WalletTransaction", payment_id))?;
                let amount = -payment.amount;
                let refund = insert_completed(
                    &txn,
                    payment.wallet_id,
                    TransactionType::Refund,
                    amount,
                    Some(format!("Refund for cancelled shipment {}", id)),
                    Some(id),
                )
                .await?;
                apply_to_balance(&txn, payment.wallet_id, amount, false).await?;
                Some(refund)
            }
            None => None,
        };

        let shipment = load_shipment(&txn, id).await?;
        txn.commit().await.map_err(db_err)?;
        Ok(CancelOutcome {
            shipment,
            released,
            refund,
        })
    }

    async fn settle_from_wallet(&self, id: i32) -> DomainResult<(Shipment, WalletTransaction)> {
        debug!("Settling shipment {} from wallet", id);
        let txn = self.db.begin().await.map_err(db_err)?;

        let current = load_shipment(&txn, id).await?;
        current.ensure_transition(ShipmentStatus::Processing)?;
        if current.total_fee <= 0 {
            return Err(DomainError::Validation(format!(
                "shipment {} has nothing to pay",
                id
            )));
        }

        let wallet = wallet_by_owner(&txn, current.owner_user_id)
            .await?
            .ok_or(DomainError::InsufficientBalance {
                required: current.total_fee,
                available: 0,
            })?;

        apply_to_balance(&txn, wallet.id, -current.total_fee, false).await?;
        let payment = insert_completed(
            &txn,
            wallet.id,
            TransactionType::Payment,
            -current.total_fee,
            Some(format!("Payment for shipment {}", id)),
            Some(id),
        )
        .await?;

        set_status(&txn, &current, ShipmentStatus::Processing, "pay").await?;
        shipment::Entity::update_many()
            .col_expr(shipment::Column::PaymentTransactionId, Expr::value(payment.id))
            .filter(shipment::Column::Id.eq(id))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        let settled = load_shipment(&txn, id).await?;
        txn.commit().await.map_err(db_err)?;
        Ok((settled, payment))
    }
}
