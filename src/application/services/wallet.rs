//! Wallet ledger service
//!
//! Deposits wait for staff review; approval credits the balance in the same
//! database transaction that completes the deposit. Adjustments apply
//! immediately and are the only way a balance may go negative.

use std::sync::Arc;

use tracing::{info, warn};
use validator::Validate;

use super::invoicing::{InvoiceOutcome, InvoiceService};
use crate::application::dto::{AdjustmentRequest, DepositRequest};
use crate::application::ports::{FileStore, Notification, NotificationCategory, NotificationSink};
use crate::domain::invoice::should_issue;
use crate::domain::wallet::{
    LedgerAudit, ReviewDecision, TransactionStatus, TransactionType, Wallet, WalletTransaction,
};
use crate::domain::{DomainError, DomainResult, RepositoryProvider};

pub struct WalletService {
    repos: Arc<dyn RepositoryProvider>,
    invoices: Arc<InvoiceService>,
    files: Arc<dyn FileStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl WalletService {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        invoices: Arc<InvoiceService>,
        files: Arc<dyn FileStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            repos,
            invoices,
            files,
            notifier,
        }
    }

    /// Get-or-create; safe to call concurrently for the same owner.
    pub async fn ensure_wallet(&self, owner_user_id: i32) -> DomainResult<Wallet> {
        self.repos.wallets().ensure(owner_user_id).await
    }

    pub async fn request_deposit(&self, request: DepositRequest) -> DomainResult<WalletTransaction> {
        request.validate()?;
        if let Some(proof) = &request.proof_ref {
            if !self.files.exists(proof).await {
                return Err(DomainError::Validation(format!(
                    "proof file '{}' does not exist",
                    proof
                )));
            }
        }

        let wallet = self.ensure_wallet(request.owner_user_id).await?;
        let tx = self
            .repos
            .wallets()
            .insert_pending(wallet.id, TransactionType::Deposit, request.amount, request.proof_ref)
            .await?;
        info!(
            transaction_id = tx.id,
            wallet_id = wallet.id,
            amount = tx.amount,
            "Deposit requested"
        );
        Ok(tx)
    }

    /// Approve or reject a pending deposit.
    ///
    /// A second review of the same transaction fails with `AlreadyReviewed`
    /// and changes nothing.
    pub async fn review(
        &self,
        transaction_id: i32,
        decision: ReviewDecision,
        reason: Option<String>,
    ) -> DomainResult<WalletTransaction> {
        let (wallet, tx) = self
            .repos
            .wallets()
            .review(transaction_id, decision, reason)
            .await?;
        info!(
            transaction_id,
            wallet_id = wallet.id,
            status = %tx.status,
            balance = wallet.balance,
            "Deposit reviewed"
        );

        let tx = if tx.status == TransactionStatus::Completed {
            metrics::counter!("freight_deposits_approved_total").increment(1);
            self.invoice_deposit(tx, wallet.owner_user_id).await?
        } else {
            tx
        };

        let (title, message) = match decision {
            ReviewDecision::Approve => (
                "Deposit approved",
                format!("{} was added to your wallet", tx.amount),
            ),
            ReviewDecision::Reject => (
                "Deposit rejected",
                match &tx.review_reason {
                    Some(reason) => format!("Your deposit of {} was rejected: {}", tx.amount, reason),
                    None => format!("Your deposit of {} was rejected", tx.amount),
                },
            ),
        };
        self.notifier.notify(
            Notification::new(wallet.owner_user_id, NotificationCategory::Wallet, title, message)
                .with_link("/wallet"),
        );
        Ok(tx)
    }

    async fn invoice_deposit(
        &self,
        tx: WalletTransaction,
        owner_user_id: i32,
    ) -> DomainResult<WalletTransaction> {
        if !should_issue(&tx, TransactionStatus::Pending, tx.status) {
            return Ok(tx);
        }
        match self.invoices.issue_for_deposit(&tx, owner_user_id).await {
            InvoiceOutcome::AlreadyClaimed => Ok(tx),
            InvoiceOutcome::Issued(_) | InvoiceOutcome::Failed(_) => self
                .repos
                .wallets()
                .find_transaction(tx.id)
                .await?
                .ok_or_else(|| DomainError::not_found("WalletTransaction", tx.id)),
        }
    }

    /// Staff correction, applied immediately. The wallet must already exist;
    /// an unknown owner is `NotFound` and nothing is written.
    pub async fn manual_adjust(
        &self,
        request: AdjustmentRequest,
    ) -> DomainResult<(Wallet, WalletTransaction)> {
        request.validate()?;
        if request.amount == 0 {
            return Err(DomainError::Validation(
                "adjustment amount must not be zero".into(),
            ));
        }

        let (wallet, tx) = self
            .repos
            .wallets()
            .adjust(request.owner_user_id, request.amount, request.note)
            .await?;
        if wallet.balance < 0 {
            warn!(wallet_id = wallet.id, balance = wallet.balance, "Wallet balance is negative");
        }
        info!(
            transaction_id = tx.id,
            wallet_id = wallet.id,
            amount = tx.amount,
            balance = wallet.balance,
            "Wallet adjusted"
        );
        self.notifier.notify(
            Notification::new(
                wallet.owner_user_id,
                NotificationCategory::Wallet,
                "Wallet adjusted",
                format!("Your balance changed by {}; it is now {}", tx.amount, wallet.balance),
            )
            .with_link("/wallet"),
        );
        Ok((wallet, tx))
    }

    /// Transactions of the owner's wallet, newest first.
    pub async fn transactions(&self, owner_user_id: i32) -> DomainResult<Vec<WalletTransaction>> {
        match self.repos.wallets().find_by_owner(owner_user_id).await? {
            Some(wallet) => self.repos.wallets().transactions(wallet.id).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn pending_deposits(&self) -> DomainResult<Vec<WalletTransaction>> {
        self.repos.wallets().pending_deposits().await
    }

    /// Compare the stored balance with the sum of completed transactions.
    pub async fn audit(&self, owner_user_id: i32) -> DomainResult<LedgerAudit> {
        let wallet = self.ensure_wallet(owner_user_id).await?;
        let completed_total = self.repos.wallets().completed_total(wallet.id).await?;
        let audit = LedgerAudit {
            wallet_id: wallet.id,
            balance: wallet.balance,
            completed_total,
        };
        if !audit.is_consistent() {
            warn!(
                wallet_id = wallet.id,
                balance = wallet.balance,
                completed_total,
                "Wallet balance does not match its ledger"
            );
        }
        Ok(audit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invoice::InvoiceStatus;
    use crate::shared::errors::ErrorKind;
    use crate::test_support::Harness;

    fn deposit(owner: i32, amount: i64) -> DepositRequest {
        DepositRequest {
            owner_user_id: owner,
            amount,
            proof_ref: None,
        }
    }

    #[tokio::test]
    async fn ensure_wallet_is_idempotent() {
        let h = Harness::new().await;
        let a = h.wallets.ensure_wallet(4).await.unwrap();
        let b = h.wallets.ensure_wallet(4).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.balance, 0);
    }

    #[tokio::test]
    async fn deposit_waits_for_review() {
        let h = Harness::new().await;
        let tx = h.wallets.request_deposit(deposit(4, 3000)).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(h.wallets.ensure_wallet(4).await.unwrap().balance, 0);
        assert_eq!(h.wallets.pending_deposits().await.unwrap().len(), 1);

        let err = h.wallets.request_deposit(deposit(4, 0)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn proof_must_exist() {
        let h = Harness::new().await;
        let err = h
            .wallets
            .request_deposit(DepositRequest {
                proof_ref: Some("proofs/missing.png".into()),
                ..deposit(4, 100)
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        h.files.put("proofs/receipt.png");
        let tx = h
            .wallets
            .request_deposit(DepositRequest {
                proof_ref: Some("proofs/receipt.png".into()),
                ..deposit(4, 100)
            })
            .await
            .unwrap();
        assert_eq!(tx.proof_ref.as_deref(), Some("proofs/receipt.png"));
    }

    #[tokio::test]
    async fn double_approval_credits_once() {
        let h = Harness::new().await;
        let tx = h.wallets.request_deposit(deposit(4, 3000)).await.unwrap();

        let approved = h
            .wallets
            .review(tx.id, ReviewDecision::Approve, None)
            .await
            .unwrap();
        assert_eq!(approved.status, TransactionStatus::Completed);
        assert_eq!(approved.invoice.status, InvoiceStatus::Issued);

        let err = h
            .wallets
            .review(tx.id, ReviewDecision::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyReviewed { .. }));

        assert_eq!(h.wallets.ensure_wallet(4).await.unwrap().balance, 3000);
        assert_eq!(h.provider.issued().len(), 1);
        assert!(h.wallets.pending_deposits().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejection_leaves_balance() {
        let h = Harness::new().await;
        let tx = h.wallets.request_deposit(deposit(4, 3000)).await.unwrap();
        let rejected = h
            .wallets
            .review(tx.id, ReviewDecision::Reject, Some("blurry proof".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status, TransactionStatus::Rejected);
        assert_eq!(rejected.review_reason.as_deref(), Some("blurry proof"));
        assert_eq!(h.wallets.ensure_wallet(4).await.unwrap().balance, 0);
        assert!(h.provider.issued().is_empty());
        assert_eq!(h.notifier.titles(), ["Deposit rejected"]);
    }

    #[tokio::test]
    async fn adjustment_is_immediate_and_may_go_negative() {
        let h = Harness::new().await;
        h.wallets.ensure_wallet(5).await.unwrap();
        let (wallet, tx) = h
            .wallets
            .manual_adjust(AdjustmentRequest {
                owner_user_id: 5,
                amount: -700,
                note: "damaged parcel compensation reversed".into(),
            })
            .await
            .unwrap();
        assert_eq!(wallet.balance, -700);
        assert_eq!(tx.tx_type, TransactionType::Adjust);
        assert_eq!(tx.status, TransactionStatus::Completed);

        let zero = h
            .wallets
            .manual_adjust(AdjustmentRequest {
                owner_user_id: 5,
                amount: 0,
                note: "noop".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(zero.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn adjusting_unknown_wallet_fails_without_writes() {
        let h = Harness::new().await;
        let err = h
            .wallets
            .manual_adjust(AdjustmentRequest {
                owner_user_id: 77,
                amount: 300,
                note: "goodwill credit".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(h.wallets.transactions(77).await.unwrap().is_empty());
        assert!(h.repos.wallets().find_by_owner(77).await.unwrap().is_none());
        assert!(h.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn balance_matches_ledger() {
        let h = Harness::new().await;
        for amount in [1000, 2500, 400] {
            let tx = h.wallets.request_deposit(deposit(6, amount)).await.unwrap();
            h.wallets
                .review(tx.id, ReviewDecision::Approve, None)
                .await
                .unwrap();
        }
        let rejected = h.wallets.request_deposit(deposit(6, 9999)).await.unwrap();
        h.wallets
            .review(rejected.id, ReviewDecision::Reject, None)
            .await
            .unwrap();
        h.wallets
            .manual_adjust(AdjustmentRequest {
                owner_user_id: 6,
                amount: -300,
                note: "fee correction".into(),
            })
            .await
            .unwrap();

        let audit = h.wallets.audit(6).await.unwrap();
        assert_eq!(audit.balance, 3600);
        assert_eq!(audit.completed_total, 3600);
        assert!(audit.is_consistent());
        assert_eq!(h.wallets.transactions(6).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn unknown_owner_has_no_transactions() {
        let h = Harness::new().await;
        assert!(h.wallets.transactions(404).await.unwrap().is_empty());
    }
}
