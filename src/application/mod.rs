pub mod dto;
pub mod ports;
pub mod services;

// Re-export key types for convenience
pub use ports::{FileStore, InvoiceProvider, NotificationSink};
pub use services::{
    InvoiceService, PackageService, RateTableStore, ShipmentService, WalletService,
};
