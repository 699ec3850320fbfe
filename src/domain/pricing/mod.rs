//! Pricing aggregate
//!
//! Rate tables, box measurements, and the pure pricing engine shared by every
//! code path that needs a fee.

pub mod engine;
pub mod model;

pub use engine::{billed_weight, price_box, price_boxes, price_shipment, quote_boxes, volumetric_units};
pub use model::{
    BoxQuote, CargoBox, CategoryLookup, PricedBox, PricingConstants, RateCategory, RateTable,
    ShipmentQuote,
};
