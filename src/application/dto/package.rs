use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::{NewPackage, PackageEdit};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ForecastRequest {
    pub owner_user_id: i32,
    #[validate(length(min = 1, max = 64, message = "tracking number is required"))]
    pub tracking_number: String,
    #[validate(length(min = 1, max = 200, message = "product name is required"))]
    pub product_name: String,
    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: i32,
    pub image_path: Option<String>,
}

impl From<ForecastRequest> for NewPackage {
    fn from(r: ForecastRequest) -> Self {
        Self {
            owner_user_id: r.owner_user_id,
            tracking_number: r.tracking_number.trim().to_string(),
            product_name: r.product_name,
            quantity: r.quantity,
            image_path: r.image_path,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PackageEditRequest {
    #[validate(length(min = 1, max = 64))]
    pub tracking_number: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub product_name: Option<String>,
    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: Option<i32>,
    /// `Some(None)` removes the image
    pub image_path: Option<Option<String>>,
}

impl From<PackageEditRequest> for PackageEdit {
    fn from(r: PackageEditRequest) -> Self {
        Self {
            tracking_number: r.tracking_number.map(|t| t.trim().to_string()),
            product_name: r.product_name,
            quantity: r.quantity,
            image_path: r.image_path,
        }
    }
}
