//! Wallet transaction entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallet_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub wallet_id: i32,

    /// Signed amount in smallest currency unit
    pub amount: i64,

    /// Deposit, Payment, Refund, Adjust
    pub tx_type: String,

    /// Pending, Completed, Rejected
    pub status: String,

    #[sea_orm(nullable)]
    pub proof_ref: Option<String>,
    #[sea_orm(nullable)]
    pub note: Option<String>,
    #[sea_orm(nullable)]
    pub review_reason: Option<String>,
    #[sea_orm(nullable)]
    pub shipment_id: Option<i32>,

    pub invoice_status: String,
    #[sea_orm(nullable)]
    pub invoice_ref: Option<String>,
    #[sea_orm(nullable)]
    pub invoice_error: Option<String>,
    #[sea_orm(nullable)]
    pub invoiced_at: Option<DateTimeUtc>,
    /// Set by each claim; an `Issuing` claim older than the lease is abandoned
    #[sea_orm(nullable)]
    pub invoice_claimed_at: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,
    #[sea_orm(nullable)]
    pub reviewed_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallet::Entity",
        from = "Column::WalletId",
        to = "super::wallet::Column::Id"
    )]
    Wallet,
}

impl Related<super::wallet::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
