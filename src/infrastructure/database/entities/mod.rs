//! Database entities module

pub mod package;
pub mod package_box;
pub mod shipment;
pub mod shipment_item;
pub mod wallet;
pub mod wallet_transaction;

pub use package::Entity as Package;
pub use package_box::Entity as PackageBox;
pub use shipment::Entity as Shipment;
pub use shipment_item::Entity as ShipmentItem;
pub use wallet::Entity as Wallet;
pub use wallet_transaction::Entity as WalletTransaction;
