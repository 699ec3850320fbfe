//! # Freight Billing
//!
//! Billing core of a freight-consolidation service: per-box pricing,
//! package and shipment lifecycles, customer wallets, and invoice triggering.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: Entities, status machines, the pricing engine, repository traits
//! - **application**: Services, request DTOs, and outbound collaborator ports
//! - **infrastructure**: SeaORM persistence, local file store, invoice provider
//! - **notifications**: In-process broadcast of user notifications
//! - **server**: Daemon runtime (metrics, migrations, background tasks)

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod notifications;
pub mod server;
pub mod shared;

#[cfg(test)]
mod test_support;

pub use config::{default_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{
    init_database, run_migrations, DatabaseConfig, LocalFileStore, SeaOrmRepositoryProvider,
    UnconfiguredInvoiceProvider,
};

// Re-export notifications
pub use notifications::{Event, EventBus, NotificationFeed};
