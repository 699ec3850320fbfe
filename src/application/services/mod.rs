//! Application services

mod invoicing;
mod packages;
mod rate_table;
mod shipments;
mod wallet;

pub use invoicing::{InvoiceOutcome, InvoiceService, RetrySummary};
pub use packages::PackageService;
pub use rate_table::RateTableStore;
pub use shipments::ShipmentService;
pub use wallet::WalletService;
