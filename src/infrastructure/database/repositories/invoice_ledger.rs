//! SeaORM implementation of InvoiceLedger
//!
//! Shipments and wallet transactions carry identical invoice columns; every
//! change is a conditional update on the current invoice status. A claim also
//! requires the entity itself to still be billable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect};

use super::db_err;
use crate::domain::invoice::{InvoiceLedger, InvoiceStatus, InvoiceTarget};
use crate::domain::shipment::ShipmentStatus;
use crate::domain::wallet::TransactionStatus;
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{shipment, wallet_transaction};

pub struct SeaOrmInvoiceLedger {
    db: DatabaseConnection,
}

impl SeaOrmInvoiceLedger {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[derive(Clone, Copy)]
struct InvoiceColumns<C> {
    id: C,
    status: C,
    reference: C,
    error: C,
    issued_at: C,
    claimed_at: C,
}

const SHIPMENT_COLUMNS: InvoiceColumns<shipment::Column> = InvoiceColumns {
    id: shipment::Column::Id,
    status: shipment::Column::InvoiceStatus,
    reference: shipment::Column::InvoiceRef,
    error: shipment::Column::InvoiceError,
    issued_at: shipment::Column::InvoicedAt,
    claimed_at: shipment::Column::InvoiceClaimedAt,
};

const TRANSACTION_COLUMNS: InvoiceColumns<wallet_transaction::Column> = InvoiceColumns {
    id: wallet_transaction::Column::Id,
    status: wallet_transaction::Column::InvoiceStatus,
    reference: wallet_transaction::Column::InvoiceRef,
    error: wallet_transaction::Column::InvoiceError,
    issued_at: wallet_transaction::Column::InvoicedAt,
    claimed_at: wallet_transaction::Column::InvoiceClaimedAt,
};

enum Change<'a> {
    Claim {
        /// Entity-level condition for being billed at all
        billable: SimpleExpr,
        stale_before: DateTime<Utc>,
    },
    Issued {
        number: &'a str,
        at: DateTime<Utc>,
    },
    Failed(&'a str),
    Voided,
}

/// Claimable, or claimed by an issuer that never finished before `stale_before`.
fn retryable<C: ColumnTrait>(cols: InvoiceColumns<C>, stale_before: DateTime<Utc>) -> Condition {
    Condition::any()
        .add(cols.status.is_in(InvoiceStatus::claimable().map(|s| s.as_str())))
        .add(
            Condition::all()
                .add(cols.status.eq(InvoiceStatus::Issuing.as_str()))
                .add(cols.claimed_at.lt(stale_before)),
        )
}

async fn apply<E: EntityTrait>(
    db: &DatabaseConnection,
    cols: InvoiceColumns<E::Column>,
    id: i32,
    change: Change<'_>,
) -> DomainResult<bool> {
    let mut update = E::update_many().filter(cols.id.eq(id));
    let values: Vec<(E::Column, SimpleExpr)> = match change {
        Change::Claim {
            billable,
            stale_before,
        } => {
            update = update
                .filter(billable)
                .filter(cols.reference.is_null())
                .filter(retryable(cols, stale_before));
            vec![
                (cols.status, Expr::value(InvoiceStatus::Issuing.as_str())),
                (cols.error, Expr::value(Option::<String>::None)),
                (cols.claimed_at, Expr::value(Utc::now())),
            ]
        }
        Change::Issued { number, at } => {
            update = update.filter(cols.status.eq(InvoiceStatus::Issuing.as_str()));
            vec![
                (cols.status, Expr::value(InvoiceStatus::Issued.as_str())),
                (cols.reference, Expr::value(number)),
                (cols.issued_at, Expr::value(at)),
                (cols.error, Expr::value(Option::<String>::None)),
            ]
        }
        Change::Failed(error) => {
            update = update.filter(cols.status.eq(InvoiceStatus::Issuing.as_str()));
            vec![
                (cols.status, Expr::value(InvoiceStatus::Failed.as_str())),
                (cols.error, Expr::value(error)),
            ]
        }
        Change::Voided => {
            update = update.filter(cols.status.eq(InvoiceStatus::Issued.as_str()));
            vec![(cols.status, Expr::value(InvoiceStatus::Voided.as_str()))]
        }
    };
    for (col, value) in values {
        update = update.col_expr(col, value);
    }
    let result = update.exec(db).await.map_err(db_err)?;
    Ok(result.rows_affected == 1)
}

/// Cancelled shipments and unapproved deposits are never billed.
fn billable(target: InvoiceTarget) -> SimpleExpr {
    match target {
        InvoiceTarget::Shipment(_) => {
            shipment::Column::Status.ne(ShipmentStatus::Cancelled.as_str())
        }
        InvoiceTarget::WalletTransaction(_) => {
            wallet_transaction::Column::Status.eq(TransactionStatus::Completed.as_str())
        }
    }
}

impl SeaOrmInvoiceLedger {
    async fn change(&self, target: InvoiceTarget, change: Change<'_>) -> DomainResult<bool> {
        match target {
            InvoiceTarget::Shipment(id) => {
                apply::<shipment::Entity>(&self.db, SHIPMENT_COLUMNS, id, change).await
            }
            InvoiceTarget::WalletTransaction(id) => {
                apply::<wallet_transaction::Entity>(&self.db, TRANSACTION_COLUMNS, id, change)
                    .await
            }
        }
    }
}

fn not_issuing(target: InvoiceTarget) -> DomainError {
    DomainError::Storage(format!("invoice for {} is not being issued", target))
}

#[async_trait]
impl InvoiceLedger for SeaOrmInvoiceLedger {
    async fn claim(&self, target: InvoiceTarget, stale_before: DateTime<Utc>) -> DomainResult<bool> {
        let change = Change::Claim {
            billable: billable(target),
            stale_before,
        };
        let claimed = self.change(target, change).await?;
        debug!("Invoice claim for {}: {}", target, claimed);
        Ok(claimed)
    }

    async fn record_issued(
        &self,
        target: InvoiceTarget,
        invoice_number: &str,
        issued_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let change = Change::Issued {
            number: invoice_number,
            at: issued_at,
        };
        if self.change(target, change).await? {
            Ok(())
        } else {
            Err(not_issuing(target))
        }
    }

    async fn record_failed(&self, target: InvoiceTarget, error: &str) -> DomainResult<()> {
        if self.change(target, Change::Failed(error)).await? {
            Ok(())
        } else {
            Err(not_issuing(target))
        }
    }

    async fn record_voided(&self, target: InvoiceTarget) -> DomainResult<bool> {
        self.change(target, Change::Voided).await
    }

    async fn find_retryable(&self, stale_before: DateTime<Utc>) -> DomainResult<Vec<InvoiceTarget>> {
        let shipments: Vec<i32> = shipment::Entity::find()
            .select_only()
            .column(shipment::Column::Id)
            .filter(retryable(SHIPMENT_COLUMNS, stale_before))
            .filter(shipment::Column::InvoiceStatus.ne(InvoiceStatus::None.as_str()))
            .filter(shipment::Column::InvoiceRef.is_null())
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_err)?;

        let transactions: Vec<i32> = wallet_transaction::Entity::find()
            .select_only()
            .column(wallet_transaction::Column::Id)
            .filter(retryable(TRANSACTION_COLUMNS, stale_before))
            .filter(wallet_transaction::Column::InvoiceStatus.ne(InvoiceStatus::None.as_str()))
            .filter(wallet_transaction::Column::InvoiceRef.is_null())
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(db_err)?;

        Ok(shipments
            .into_iter()
            .map(InvoiceTarget::Shipment)
            .chain(transactions.into_iter().map(InvoiceTarget::WalletTransaction))
            .collect())
    }
}
