use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::RecipientInfo;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecipientRequest {
    #[validate(length(min = 1, max = 100, message = "recipient name is required"))]
    pub name: String,
    #[validate(length(min = 5, max = 32, message = "invalid phone number"))]
    pub phone: String,
    #[validate(length(min = 1, max = 500, message = "address is required"))]
    pub address: String,
}

impl From<RecipientRequest> for RecipientInfo {
    fn from(r: RecipientRequest) -> Self {
        Self {
            name: r.name,
            phone: r.phone,
            address: r.address,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateShipmentRequest {
    pub owner_user_id: i32,
    #[validate(length(min = 1, message = "select at least one package"))]
    pub package_ids: Vec<i32>,
    /// Remote-area surcharge per CBM for the destination; 0 for none
    #[validate(range(min = 0, message = "remote area rate must not be negative"))]
    pub remote_area_rate: i64,
    #[validate(nested)]
    pub recipient: RecipientRequest,
}
