//! Package repository interface

use async_trait::async_trait;

use super::model::{NewPackage, Package};
use crate::domain::DomainResult;

#[async_trait]
pub trait PackageRepository: Send + Sync {
    /// Insert a pending package. Fails with `DuplicateTrackingNumber`.
    async fn insert(&self, package: NewPackage) -> DomainResult<Package>;
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Package>>;
    async fn find_by_ids(&self, ids: &[i32]) -> DomainResult<Vec<Package>>;
    async fn find_by_tracking_number(&self, tracking_number: &str) -> DomainResult<Option<Package>>;
    async fn find_by_owner(&self, owner_user_id: i32) -> DomainResult<Vec<Package>>;
    /// Current members of a shipment (packages still pointing at it).
    async fn find_by_shipment(&self, shipment_id: i32) -> DomainResult<Vec<Package>>;
    /// Persist status, fee and boxes in one transaction, provided the stored
    /// row is still at `expected_revision` and unclaimed.
    async fn save_measurement(&self, package: &Package, expected_revision: i32) -> DomainResult<()>;
    /// Persist customer-editable fields, provided the row is still pending at
    /// `expected_revision`.
    async fn save_details(&self, package: &Package, expected_revision: i32) -> DomainResult<()>;
    /// Delete a package that is still pending.
    async fn delete_pending(&self, id: i32) -> DomainResult<()>;
}
