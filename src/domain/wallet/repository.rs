//! Wallet repository interface
//!
//! The balance column is only ever changed in the same database transaction
//! that writes a `Completed` wallet transaction.

use async_trait::async_trait;

use super::model::{ReviewDecision, TransactionType, Wallet, WalletTransaction};
use crate::domain::DomainResult;

#[async_trait]
pub trait WalletRepository: Send + Sync {
    /// Get-or-create the owner's wallet.
    async fn ensure(&self, owner_user_id: i32) -> DomainResult<Wallet>;
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Wallet>>;
    async fn find_by_owner(&self, owner_user_id: i32) -> DomainResult<Option<Wallet>>;
    async fn find_transaction(&self, id: i32) -> DomainResult<Option<WalletTransaction>>;
    async fn transactions(&self, wallet_id: i32) -> DomainResult<Vec<WalletTransaction>>;
    async fn pending_deposits(&self) -> DomainResult<Vec<WalletTransaction>>;
    /// Record a pending transaction; the balance is untouched.
    async fn insert_pending(
        &self,
        wallet_id: i32,
        tx_type: TransactionType,
        amount: i64,
        proof_ref: Option<String>,
    ) -> DomainResult<WalletTransaction>;
    /// Flip a pending transaction to its decided status; approval credits the
    /// wallet in the same transaction. Fails with `AlreadyReviewed`.
    async fn review(
        &self,
        transaction_id: i32,
        decision: ReviewDecision,
        reason: Option<String>,
    ) -> DomainResult<(Wallet, WalletTransaction)>;
    /// Record a completed adjustment and apply it to an existing wallet.
    async fn adjust(
        &self,
        owner_user_id: i32,
        amount: i64,
        note: String,
    ) -> DomainResult<(Wallet, WalletTransaction)>;
    /// Sum of completed transaction amounts.
    async fn completed_total(&self, wallet_id: i32) -> DomainResult<i64>;
}
