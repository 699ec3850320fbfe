//! Wallet aggregate

pub mod model;
pub mod repository;

pub use model::{
    LedgerAudit, ReviewDecision, TransactionStatus, TransactionType, Wallet, WalletTransaction,
};
pub use repository::WalletRepository;
