//! Shared fixtures for service and repository tests

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;

use crate::application::dto::{CreateShipmentRequest, ForecastRequest, RecipientRequest};
use crate::application::ports::{
    FileStore, FileStoreError, InvoiceError, InvoiceProvider, InvoiceRequest, IssuedInvoice,
    Notification, NotificationSink,
};
use crate::application::services::{
    InvoiceService, PackageService, RateTableStore, ShipmentService, WalletService,
};
use crate::domain::pricing::CargoBox;
use crate::domain::{Package, RepositoryProvider, Shipment};
use crate::infrastructure::{init_database, run_migrations, DatabaseConfig, SeaOrmRepositoryProvider};
use crate::shared::retry::RetryConfig;

/// Fresh in-memory database with the schema applied.
pub async fn memory_db() -> DatabaseConnection {
    let db = init_database(&DatabaseConfig::in_memory())
        .await
        .expect("in-memory database");
    run_migrations(&db).await.expect("migrations");
    db
}

/// 10 kg, 50 x 50 x 50 cm general cargo: 5 volumetric units, fee 625 at the
/// default rates.
pub fn standard_box() -> CargoBox {
    CargoBox {
        name: "Box".into(),
        category_key: "general".into(),
        weight_kg: Some(dec!(10)),
        length_cm: Some(dec!(50)),
        width_cm: Some(dec!(50)),
        height_cm: Some(dec!(50)),
        cbm: None,
    }
}

// ── InvoiceProvider ────────────────────────────────────────────

enum Behaviour {
    Accept,
    /// Fail this many calls as unavailable, then accept
    FailFirst(usize),
    Reject,
}

/// Records every request; numbers invoices `INV-<n>`.
pub struct RecordingInvoiceProvider {
    behaviour: Behaviour,
    requests: Mutex<Vec<InvoiceRequest>>,
    issued: Mutex<Vec<String>>,
    voided: Mutex<Vec<String>>,
}

impl RecordingInvoiceProvider {
    fn with_behaviour(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            requests: Mutex::new(Vec::new()),
            issued: Mutex::new(Vec::new()),
            voided: Mutex::new(Vec::new()),
        }
    }

    pub fn new() -> Self {
        Self::with_behaviour(Behaviour::Accept)
    }

    pub fn failing(calls: usize) -> Self {
        Self::with_behaviour(Behaviour::FailFirst(calls))
    }

    pub fn rejecting() -> Self {
        Self::with_behaviour(Behaviour::Reject)
    }

    pub fn requests(&self) -> Vec<InvoiceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }

    pub fn voided(&self) -> Vec<String> {
        self.voided.lock().unwrap().clone()
    }
}

#[async_trait]
impl InvoiceProvider for RecordingInvoiceProvider {
    async fn issue(&self, request: InvoiceRequest) -> Result<IssuedInvoice, InvoiceError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        match self.behaviour {
            Behaviour::Reject => Err(InvoiceError::Rejected("tax id missing".into())),
            Behaviour::FailFirst(n) if call <= n => {
                Err(InvoiceError::Unavailable("connection reset".into()))
            }
            _ => {
                let mut issued = self.issued.lock().unwrap();
                let number = format!("INV-{}", issued.len() + 1);
                issued.push(number.clone());
                Ok(IssuedInvoice {
                    invoice_number: number,
                    issued_at: Utc::now(),
                })
            }
        }
    }

    async fn void(&self, invoice_number: &str, _reason: &str) -> Result<(), InvoiceError> {
        self.voided.lock().unwrap().push(invoice_number.to_string());
        Ok(())
    }
}

// ── NotificationSink ───────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.sent().into_iter().map(|n| n.title).collect()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

// ── FileStore ──────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingFileStore {
    files: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
}

impl RecordingFileStore {
    pub fn put(&self, reference: &str) {
        self.files.lock().unwrap().insert(reference.to_string());
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileStore for RecordingFileStore {
    async fn exists(&self, reference: &str) -> bool {
        self.files.lock().unwrap().contains(reference)
    }

    async fn delete(&self, reference: &str) -> Result<(), FileStoreError> {
        self.files.lock().unwrap().remove(reference);
        self.deleted.lock().unwrap().push(reference.to_string());
        Ok(())
    }
}

// ── Harness ────────────────────────────────────────────────────

/// Every service wired against one in-memory database and recording fakes.
pub struct Harness {
    pub repos: Arc<dyn RepositoryProvider>,
    pub rates: Arc<RateTableStore>,
    pub provider: Arc<RecordingInvoiceProvider>,
    pub notifier: Arc<RecordingNotifier>,
    pub files: Arc<RecordingFileStore>,
    pub invoices: Arc<InvoiceService>,
    pub packages: PackageService,
    pub shipments: ShipmentService,
    pub wallets: WalletService,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_provider(RecordingInvoiceProvider::new()).await
    }

    pub async fn with_provider(provider: RecordingInvoiceProvider) -> Self {
        let db = memory_db().await;
        let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db));
        let rates = Arc::new(RateTableStore::default());
        let provider = Arc::new(provider);
        let notifier = Arc::new(RecordingNotifier::default());
        let files = Arc::new(RecordingFileStore::default());

        let retry = RetryConfig {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_millis(1),
        };
        let invoices = Arc::new(InvoiceService::new(repos.clone(), provider.clone(), retry));

        Self {
            packages: PackageService::new(
                repos.clone(),
                rates.clone(),
                files.clone(),
                notifier.clone(),
            ),
            shipments: ShipmentService::new(
                repos.clone(),
                rates.clone(),
                invoices.clone(),
                notifier.clone(),
            ),
            wallets: WalletService::new(
                repos.clone(),
                invoices.clone(),
                files.clone(),
                notifier.clone(),
            ),
            repos,
            rates,
            provider,
            notifier,
            files,
            invoices,
        }
    }

    pub async fn get_shipment(&self, id: i32) -> Shipment {
        self.repos
            .shipments()
            .find_by_id(id)
            .await
            .expect("shipment lookup")
            .expect("shipment exists")
    }

    /// Forecast a package and measure it as one standard box.
    pub async fn arrived_package(&self, owner_user_id: i32, tracking_number: &str) -> Package {
        let package = self
            .packages
            .forecast(ForecastRequest {
                owner_user_id,
                tracking_number: tracking_number.to_string(),
                product_name: "Sample goods".into(),
                quantity: 1,
                image_path: None,
            })
            .await
            .expect("forecast");
        self.packages
            .record_measurement(package.id, vec![standard_box()])
            .await
            .expect("measurement")
    }

    /// A pending-payment shipment of `packages` freshly arrived packages.
    pub async fn arrived_shipment(&self, owner_user_id: i32, packages: usize) -> Shipment {
        let mut package_ids = Vec::with_capacity(packages);
        for _ in 0..packages {
            let tracking = format!("AUTO-{}-{}", owner_user_id, next_serial());
            package_ids.push(self.arrived_package(owner_user_id, &tracking).await.id);
        }
        self.shipments
            .create_shipment(CreateShipmentRequest {
                owner_user_id,
                package_ids,
                remote_area_rate: 0,
                recipient: RecipientRequest {
                    name: "Sam Lee".into(),
                    phone: "555-0199".into(),
                    address: "1 Dock Street".into(),
                },
            })
            .await
            .expect("shipment")
    }
}

fn next_serial() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}
