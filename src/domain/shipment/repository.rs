//! Shipment repository interface
//!
//! Every method that touches both a shipment and its packages (or a wallet)
//! runs as a single database transaction.

use async_trait::async_trait;

use super::model::{CancelOutcome, NewShipment, Shipment, ShipmentStatus};
use crate::domain::wallet::WalletTransaction;
use crate::domain::DomainResult;

#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    /// Insert the shipment and claim every member package.
    ///
    /// Each claim is a conditional update on (owner, `Arrived`, unassigned,
    /// revision); if any claim misses, nothing is written and the error lists
    /// every offending package.
    async fn create(&self, shipment: NewShipment) -> DomainResult<Shipment>;
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Shipment>>;
    async fn find_by_owner(&self, owner_user_id: i32) -> DomainResult<Vec<Shipment>>;
    /// Move `from` -> `to` if the stored status is still `from`. Completing
    /// finalizes the member packages in the same transaction.
    async fn transition(
        &self,
        id: i32,
        from: ShipmentStatus,
        to: ShipmentStatus,
    ) -> DomainResult<Shipment>;
    /// Cancel, release every member package, and refund a wallet payment.
    async fn cancel(&self, id: i32, reason: Option<String>) -> DomainResult<CancelOutcome>;
    /// Debit the owner's wallet by the shipment total and move the shipment
    /// to `Processing`.
    async fn settle_from_wallet(&self, id: i32) -> DomainResult<(Shipment, WalletTransaction)>;
}
