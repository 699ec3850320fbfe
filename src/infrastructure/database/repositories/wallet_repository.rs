//! SeaORM implementation of WalletRepository

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use super::{db_err, invoice_record};
use crate::domain::invoice::InvoiceStatus;
use crate::domain::wallet::{
    ReviewDecision, TransactionStatus, TransactionType, Wallet, WalletRepository,
    WalletTransaction,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::{wallet, wallet_transaction};

pub struct SeaOrmWalletRepository {
    db: DatabaseConnection,
}

impl SeaOrmWalletRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn wallet_from_model(model: wallet::Model) -> Wallet {
    Wallet {
        id: model.id,
        owner_user_id: model.owner_user_id,
        balance: model.balance,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

pub(crate) fn transaction_from_model(
    model: wallet_transaction::Model,
) -> DomainResult<WalletTransaction> {
    let tx_type = TransactionType::from_str(&model.tx_type).ok_or_else(|| {
        DomainError::Storage(format!("unknown transaction type '{}'", model.tx_type))
    })?;
    let status = TransactionStatus::from_str(&model.status).ok_or_else(|| {
        DomainError::Storage(format!("unknown transaction status '{}'", model.status))
    })?;
    Ok(WalletTransaction {
        id: model.id,
        wallet_id: model.wallet_id,
        amount: model.amount,
        tx_type,
        status,
        proof_ref: model.proof_ref,
        note: model.note,
        review_reason: model.review_reason,
        shipment_id: model.shipment_id,
        invoice: invoice_record(
            &model.invoice_status,
            model.invoice_ref,
            model.invoiced_at,
            model.invoice_error,
        )?,
        created_at: model.created_at,
        reviewed_at: model.reviewed_at,
    })
}

pub(crate) async fn wallet_by_owner<C: ConnectionTrait>(
    conn: &C,
    owner_user_id: i32,
) -> DomainResult<Option<Wallet>> {
    Ok(wallet::Entity::find()
        .filter(wallet::Column::OwnerUserId.eq(owner_user_id))
        .one(conn)
        .await
        .map_err(db_err)?
        .map(wallet_from_model))
}

async fn wallet_by_id<C: ConnectionTrait>(conn: &C, id: i32) -> DomainResult<Wallet> {
    wallet::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(db_err)?
        .map(wallet_from_model)
        .ok_or_else(|| DomainError::not_found("Wallet", id))
}

/// Add `amount` to the balance. A debit is refused (without writing) when it
/// would take the balance below zero and `allow_negative` is false.
pub(crate) async fn apply_to_balance<C: ConnectionTrait>(
    conn: &C,
    wallet_id: i32,
    amount: i64,
    allow_negative: bool,
) -> DomainResult<Wallet> {
    let mut update = wallet::Entity::update_many()
        .col_expr(wallet::Column::Balance, Expr::col(wallet::Column::Balance).add(amount))
        .col_expr(wallet::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(wallet::Column::Id.eq(wallet_id));
    if amount < 0 && !allow_negative {
        update = update.filter(wallet::Column::Balance.gte(-amount));
    }
    let result = update.exec(conn).await.map_err(db_err)?;

    let current = wallet_by_id(conn, wallet_id).await?;
    if result.rows_affected != 1 {
        return Err(DomainError::InsufficientBalance {
            required: -amount,
            available: current.balance,
        });
    }
    Ok(current)
}

/// Insert a `Completed` transaction. The caller applies the balance change
/// in the same database transaction.
pub(crate) async fn insert_completed<C: ConnectionTrait>(
    conn: &C,
    wallet_id: i32,
    tx_type: TransactionType,
    amount: i64,
    note: Option<String>,
    shipment_id: Option<i32>,
) -> DomainResult<WalletTransaction> {
    let now = Utc::now();
    let model = wallet_transaction::ActiveModel {
        id: NotSet,
        wallet_id: Set(wallet_id),
        amount: Set(amount),
        tx_type: Set(tx_type.as_str().to_string()),
        status: Set(TransactionStatus::Completed.as_str().to_string()),
        proof_ref: Set(None),
        note: Set(note),
        review_reason: Set(None),
        shipment_id: Set(shipment_id),
        invoice_status: Set(InvoiceStatus::None.as_str().to_string()),
        invoice_ref: Set(None),
        invoice_error: Set(None),
        invoiced_at: Set(None),
        invoice_claimed_at: Set(None),
        created_at: Set(now),
        reviewed_at: Set(Some(now)),
    }
    .insert(conn)
    .await
    .map_err(db_err)?;
    transaction_from_model(model)
}

pub(crate) async fn load_transaction<C: ConnectionTrait>(
    conn: &C,
    id: i32,
) -> DomainResult<Option<WalletTransaction>> {
    wallet_transaction::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(db_err)?
        .map(transaction_from_model)
        .transpose()
}

#[derive(Debug, FromQueryResult)]
struct AmountSum {
    total: Option<i64>,
}

// ── WalletRepository impl ───────────────────────────────────────

#[async_trait]
impl WalletRepository for SeaOrmWalletRepository {
    async fn ensure(&self, owner_user_id: i32) -> DomainResult<Wallet> {
        if let Some(existing) = wallet_by_owner(&self.db, owner_user_id).await? {
            return Ok(existing);
        }

        debug!("Creating wallet for user {}", owner_user_id);
        let now = Utc::now();
        let model = wallet::ActiveModel {
            id: NotSet,
            owner_user_id: Set(owner_user_id),
            balance: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };
        // A concurrent creator may win the unique index; both end up reading
        // the same row.
        wallet::Entity::insert(model)
            .on_conflict(
                OnConflict::column(wallet::Column::OwnerUserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(db_err)?;

        wallet_by_owner(&self.db, owner_user_id)
            .await?
            .ok_or_else(|| DomainError::Storage(format!("wallet for user {} vanished", owner_user_id)))
    }

    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Wallet>> {
        Ok(wallet::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(wallet_from_model))
    }

    async fn find_by_owner(&self, owner_user_id: i32) -> DomainResult<Option<Wallet>> {
        wallet_by_owner(&self.db, owner_user_id).await
    }

    async fn find_transaction(&self, id: i32) -> DomainResult<Option<WalletTransaction>> {
        load_transaction(&self.db, id).await
    }

    async fn transactions(&self, wallet_id: i32) -> DomainResult<Vec<WalletTransaction>> {
        wallet_transaction::Entity::find()
            .filter(wallet_transaction::Column::WalletId.eq(wallet_id))
            .order_by_desc(wallet_transaction::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(transaction_from_model)
            .collect()
    }

    async fn pending_deposits(&self) -> DomainResult<Vec<WalletTransaction>> {
        wallet_transaction::Entity::find()
            .filter(wallet_transaction::Column::TxType.eq(TransactionType::Deposit.as_str()))
            .filter(wallet_transaction::Column::Status.eq(TransactionStatus::Pending.as_str()))
            .order_by_asc(wallet_transaction::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(transaction_from_model)
            .collect()
    }

    async fn insert_pending(
        &self,
        wallet_id: i32,
        tx_type: TransactionType,
        amount: i64,
        proof_ref: Option<String>,
    ) -> DomainResult<WalletTransaction> {
        debug!("Recording pending {} of {} on wallet {}", tx_type.as_str(), amount, wallet_id);
        let model = wallet_transaction::ActiveModel {
            id: NotSet,
            wallet_id: Set(wallet_id),
            amount: Set(amount),
            tx_type: Set(tx_type.as_str().to_string()),
            status: Set(TransactionStatus::Pending.as_str().to_string()),
            proof_ref: Set(proof_ref),
            note: Set(None),
            review_reason: Set(None),
            shipment_id: Set(None),
            invoice_status: Set(InvoiceStatus::None.as_str().to_string()),
            invoice_ref: Set(None),
            invoice_error: Set(None),
            invoiced_at: Set(None),
            invoice_claimed_at: Set(None),
            created_at: Set(Utc::now()),
            reviewed_at: Set(None),
        }
        .insert(&self.db)
        .await
        .map_err(db_err)?;
        transaction_from_model(model)
    }

    async fn review(
        &self,
        transaction_id: i32,
        decision: ReviewDecision,
        reason: Option<String>,
    ) -> DomainResult<(Wallet, WalletTransaction)> {
        debug!("Reviewing transaction {}: {:?}", transaction_id, decision);
        let txn = self.db.begin().await.map_err(db_err)?;

        let decided = decision.resulting_status();
        let result = wallet_transaction::Entity::update_many()
            .col_expr(wallet_transaction::Column::Status, Expr::value(decided.as_str()))
            .col_expr(wallet_transaction::Column::ReviewReason, Expr::value(reason))
            .col_expr(wallet_transaction::Column::ReviewedAt, Expr::value(Utc::now()))
            .filter(wallet_transaction::Column::Id.eq(transaction_id))
            .filter(wallet_transaction::Column::Status.eq(TransactionStatus::Pending.as_str()))
            .exec(&txn)
            .await
            .map_err(db_err)?;

        let tx = load_transaction(&txn, transaction_id)
            .await?
            .ok_or_else(|| DomainError::not_found("WalletTransaction", transaction_id))?;

        if result.rows_affected != 1 {
            return Err(DomainError::AlreadyReviewed {
                transaction_id,
                status: tx.status.to_string(),
            });
        }

        let wallet = if decided == TransactionStatus::Completed {
            apply_to_balance(&txn, tx.wallet_id, tx.amount, false).await?
        } else {
            wallet_by_id(&txn, tx.wallet_id).await?
        };

        txn.commit().await.map_err(db_err)?;
        Ok((wallet, tx))
    }

    async fn adjust(
        &self,
        owner_user_id: i32,
        amount: i64,
        note: String,
    ) -> DomainResult<(Wallet, WalletTransaction)> {
        debug!("Adjusting wallet of user {} by {}", owner_user_id, amount);
        let txn = self.db.begin().await.map_err(db_err)?;

        let wallet = wallet_by_owner(&txn, owner_user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "Wallet",
                field: "owner_user_id",
                value: owner_user_id.to_string(),
            })?;

        let tx = insert_completed(
            &txn,
            wallet.id,
            TransactionType::Adjust,
            amount,
            Some(note),
            None,
        )
        .await?;
        let wallet = apply_to_balance(&txn, wallet.id, amount, true).await?;

        txn.commit().await.map_err(db_err)?;
        Ok((wallet, tx))
    }

    async fn completed_total(&self, wallet_id: i32) -> DomainResult<i64> {
        let sum = wallet_transaction::Entity::find()
            .select_only()
            .column_as(wallet_transaction::Column::Amount.sum(), "total")
            .filter(wallet_transaction::Column::WalletId.eq(wallet_id))
            .filter(wallet_transaction::Column::Status.eq(TransactionStatus::Completed.as_str()))
            .into_model::<AmountSum>()
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(sum.and_then(|s| s.total).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_db;

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let repo = SeaOrmWalletRepository::new(memory_db().await);
        let a = repo.ensure(42).await.unwrap();
        let b = repo.ensure(42).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.balance, 0);
    }

    #[tokio::test]
    async fn approve_credits_once() {
        let repo = SeaOrmWalletRepository::new(memory_db().await);
        let wallet = repo.ensure(1).await.unwrap();
        let tx = repo
            .insert_pending(wallet.id, TransactionType::Deposit, 5000, None)
            .await
            .unwrap();
        assert_eq!(repo.ensure(1).await.unwrap().balance, 0);

        let (wallet, tx) = repo.review(tx.id, ReviewDecision::Approve, None).await.unwrap();
        assert_eq!(wallet.balance, 5000);
        assert_eq!(tx.status, TransactionStatus::Completed);

        let err = repo
            .review(tx.id, ReviewDecision::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyReviewed { .. }));
        assert_eq!(repo.ensure(1).await.unwrap().balance, 5000);
        assert_eq!(repo.completed_total(wallet.id).await.unwrap(), 5000);
    }

    #[tokio::test]
    async fn reject_leaves_balance() {
        let repo = SeaOrmWalletRepository::new(memory_db().await);
        let wallet = repo.ensure(1).await.unwrap();
        let tx = repo
            .insert_pending(wallet.id, TransactionType::Deposit, 700, Some("proofs/a.png".into()))
            .await
            .unwrap();
        let (wallet, tx) = repo
            .review(tx.id, ReviewDecision::Reject, Some("blurry".into()))
            .await
            .unwrap();
        assert_eq!(wallet.balance, 0);
        assert_eq!(tx.status, TransactionStatus::Rejected);
        assert_eq!(tx.review_reason.as_deref(), Some("blurry"));
    }

    #[tokio::test]
    async fn review_of_unknown_transaction_is_not_found() {
        let repo = SeaOrmWalletRepository::new(memory_db().await);
        let err = repo
            .review(99, ReviewDecision::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn adjust_may_go_negative_but_needs_wallet() {
        let repo = SeaOrmWalletRepository::new(memory_db().await);
        let err = repo.adjust(5, 100, "bonus".into()).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { field: "owner_user_id", .. }));

        repo.ensure(5).await.unwrap();
        let (wallet, tx) = repo.adjust(5, -300, "damage".into()).await.unwrap();
        assert_eq!(wallet.balance, -300);
        assert_eq!(tx.tx_type, TransactionType::Adjust);
        assert_eq!(repo.completed_total(wallet.id).await.unwrap(), -300);
    }
}
