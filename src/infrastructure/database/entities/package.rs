//! Package entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "packages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub owner_user_id: i32,

    #[sea_orm(unique)]
    pub tracking_number: String,

    pub product_name: String,
    pub quantity: i32,

    #[sea_orm(nullable)]
    pub image_path: Option<String>,

    /// Sum of box fees in smallest currency unit
    pub computed_fee: i64,

    /// Pending, Arrived, InShipment, Completed
    pub status: String,

    /// Owning shipment while InShipment
    #[sea_orm(nullable)]
    pub shipment_id: Option<i32>,

    /// Optimistic concurrency counter
    pub revision: i32,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,

    #[sea_orm(nullable)]
    pub arrived_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::package_box::Entity")]
    Boxes,
}

impl Related<super::package_box::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Boxes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
