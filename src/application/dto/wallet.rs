use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DepositRequest {
    pub owner_user_id: i32,
    #[validate(range(min = 1, message = "deposit amount must be positive"))]
    pub amount: i64,
    /// File store reference to the transfer proof
    pub proof_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AdjustmentRequest {
    pub owner_user_id: i32,
    /// Signed correction; must not be zero
    pub amount: i64,
    #[validate(length(min = 1, max = 500, message = "a note is required"))]
    pub note: String,
}
