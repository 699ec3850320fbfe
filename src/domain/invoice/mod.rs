//! Invoice aggregate
//!
//! Invoice status model, the issuance trigger, and the bookkeeping interface.

pub mod model;
pub mod repository;
pub mod trigger;

pub use model::{InvoiceRecord, InvoiceStatus, InvoiceTarget};
pub use repository::InvoiceLedger;
pub use trigger::{should_issue, Invoiceable};
