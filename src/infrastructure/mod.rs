//! Infrastructure layer - external concerns

pub mod database;
pub mod files;
pub mod invoicing;

pub use database::repositories::SeaOrmRepositoryProvider;
pub use database::{init_database, run_migrations, DatabaseConfig};
pub use files::LocalFileStore;
pub use invoicing::UnconfiguredInvoiceProvider;
