//! Shipment aggregate
//!
//! Consolidated shipments, their state machine, and the repository interface.

pub mod model;
pub mod repository;

pub use model::{
    CancelOutcome, NewShipment, RecipientInfo, Shipment, ShipmentMember, ShipmentStatus,
};
pub use repository::ShipmentRepository;
