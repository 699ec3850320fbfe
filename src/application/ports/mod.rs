//! Application ports (hexagonal architecture boundaries)

pub mod outbound;

pub use outbound::{
    FileStore, FileStoreError, InvoiceError, InvoiceLine, InvoiceProvider, InvoiceRequest,
    IssuedInvoice, Notification, NotificationCategory, NotificationSink,
};
