//! Measured box of a package, with the quote it was priced at

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "package_boxes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub package_id: i32,

    /// Order within the package
    pub position: i32,

    pub name: String,

    /// Category key as entered
    pub category_key: String,

    /// Category actually billed
    pub billed_category: String,
    pub fell_back: bool,

    // Measurements as canonical decimal text

    #[sea_orm(nullable)]
    pub weight_kg: Option<String>,
    #[sea_orm(nullable)]
    pub length_cm: Option<String>,
    #[sea_orm(nullable)]
    pub width_cm: Option<String>,
    #[sea_orm(nullable)]
    pub height_cm: Option<String>,
    #[sea_orm(nullable)]
    pub cbm: Option<String>,

    // Quote

    pub volumetric_units: i64,
    pub volume_cost: i64,
    pub weight_cost: i64,
    pub fee: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::package::Entity",
        from = "Column::PackageId",
        to = "super::package::Column::Id"
    )]
    Package,
}

impl Related<super::package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Package.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
