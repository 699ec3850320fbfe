pub mod invoice;
pub mod package;
pub mod pricing;
pub mod repositories;
pub mod shipment;
pub mod wallet;

// Re-export commonly used types
pub use invoice::{InvoiceRecord, InvoiceStatus, InvoiceTarget};
pub use package::{NewPackage, Package, PackageEdit, PackageStatus};
pub use pricing::{BoxQuote, CargoBox, PricedBox, PricingConstants, RateCategory, RateTable, ShipmentQuote};
pub use repositories::{DomainResult, RepositoryProvider};
pub use shipment::{RecipientInfo, Shipment, ShipmentStatus};
pub use wallet::{ReviewDecision, TransactionStatus, TransactionType, Wallet, WalletTransaction};

pub use crate::shared::errors::DomainError;
