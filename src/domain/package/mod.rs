//! Package aggregate
//!
//! Forecast packages, their measured boxes, and the repository interface.

pub mod model;
pub mod repository;

pub use model::{NewPackage, Package, PackageEdit, PackageStatus};
pub use repository::PackageRepository;
