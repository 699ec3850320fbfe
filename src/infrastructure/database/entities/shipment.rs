//! Shipment entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub owner_user_id: i32,

    pub recipient_name: String,
    pub recipient_phone: String,
    pub recipient_address: String,

    // Fee breakdown (smallest currency unit)

    pub base_fee: i64,
    pub minimum_applied: bool,
    pub oversized_fee: i64,
    pub overweight_fee: i64,
    pub remote_area_fee: i64,
    pub total_fee: i64,
    pub remote_area_rate: i64,
    pub total_volumetric_units: i64,

    /// Rate table fingerprint used for the quote
    pub rate_version: String,

    /// PendingPayment, Processing, Shipped, Completed, Cancelled
    pub status: String,

    // Invoice bookkeeping

    /// None, Issuing, Issued, Failed, Voided
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

    #[sea_orm(nullable)]
    pub payment_transaction_id: Option<i32>,
    #[sea_orm(nullable)]
    pub cancel_reason: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::shipment_item::Entity")]
    Items,
}

impl Related<super::shipment_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
