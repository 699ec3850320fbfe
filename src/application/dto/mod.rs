//! Validated request types for the operations the core exposes

mod package;
mod shipment;
mod wallet;

pub use package::{ForecastRequest, PackageEditRequest};
pub use shipment::{CreateShipmentRequest, RecipientRequest};
pub use wallet::{AdjustmentRequest, DepositRequest};
