//! Billing daemon runtime.
//!
//! Provides [`ServerHandle`] that encapsulates the full lifecycle: metrics,
//! database init and migrations, service wiring, the failed-invoice sweep,
//! rate table reloads on SIGHUP, and graceful shutdown.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::ports::{FileStore, InvoiceProvider, NotificationSink};
use crate::application::services::{
    InvoiceService, PackageService, RateTableStore, ShipmentService, WalletService,
};
use crate::config::AppConfig;
use crate::domain::RepositoryProvider;
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};
use crate::{
    init_database, run_migrations, DatabaseConfig, EventBus, LocalFileStore,
    SeaOrmRepositoryProvider, UnconfiguredInvoiceProvider,
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the billing daemon.
pub struct ServerOptions {
    /// Application configuration.
    pub config: AppConfig,
    /// File the configuration came from; SIGHUP re-reads its `[pricing]`.
    pub config_path: Option<PathBuf>,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            config_path: None,
            auto_migrate: true,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running billing daemon.
///
/// Exposes the wired services for an outer layer (HTTP, jobs) to call.
///
/// ```rust,no_run
/// use freight_billing::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     let quote = handle.shipments.preview_cost(7, &[1, 2], 0).await?;
///     println!("total {}", quote.total_fee);
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    /// Repository provider for data access.
    pub repos: Arc<dyn RepositoryProvider>,
    /// Current rate table.
    pub rates: Arc<RateTableStore>,
    /// User notifications published by the services.
    pub event_bus: Arc<EventBus>,
    pub packages: Arc<PackageService>,
    pub shipments: Arc<ShipmentService>,
    pub wallets: Arc<WalletService>,
    pub invoices: Arc<InvoiceService>,
    /// The configuration the daemon was started with.
    pub config: AppConfig,

    db: DatabaseConnection,
    shutdown: ShutdownCoordinator,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Start the daemon with the given options.
    ///
    /// This will:
    /// 1. Install the Prometheus recorder (with an HTTP listener if configured)
    /// 2. Connect to the database and run migrations
    /// 3. Wire repositories, collaborators, and services
    /// 4. Start the invoice retry sweep and the rate table reloader
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let app_cfg = opts.config;

        info!("Starting freight billing...");

        // ── Prometheus metrics recorder ────────────────────────
        // The global recorder can only be installed once per process.
        static METRICS_INSTALLED: OnceLock<()> = OnceLock::new();
        if METRICS_INSTALLED.set(()).is_ok() {
            install_metrics(&app_cfg)?;
        }

        // ── Database ───────────────────────────────────────────
        let db_config = DatabaseConfig::from(app_cfg.database.clone());
        let db = init_database(&db_config).await.map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;
        if opts.auto_migrate {
            run_migrations(&db).await.map_err(|e| {
                error!("Failed to run migrations: {}", e);
                e
            })?;
        }

        // ── Services ───────────────────────────────────────────
        let repos: Arc<dyn RepositoryProvider> =
            Arc::new(SeaOrmRepositoryProvider::new(db.clone()));
        let rates = Arc::new(RateTableStore::new(app_cfg.pricing.to_rate_table())?);

        let event_bus = EventBus::new();
        let notifier: Arc<dyn NotificationSink> = event_bus.clone();
        let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(app_cfg.files.root.clone()));
        // No provider integration ships with the daemon; failures queue for
        // the sweep until one is configured.
        let provider: Arc<dyn InvoiceProvider> = Arc::new(UnconfiguredInvoiceProvider);

        let invoices = Arc::new(
            InvoiceService::new(repos.clone(), provider, app_cfg.invoicing.retry_config())
                .with_claim_lease(app_cfg.invoicing.claim_lease()),
        );
        let packages = Arc::new(PackageService::new(
            repos.clone(),
            rates.clone(),
            files.clone(),
            notifier.clone(),
        ));
        let shipments = Arc::new(ShipmentService::new(
            repos.clone(),
            rates.clone(),
            invoices.clone(),
            notifier.clone(),
        ));
        let wallets = Arc::new(WalletService::new(
            repos.clone(),
            invoices.clone(),
            files,
            notifier,
        ));

        // ── Background tasks ───────────────────────────────────
        let shutdown = ShutdownCoordinator::new(SHUTDOWN_TIMEOUT);
        let signal = shutdown.signal();

        let mut tasks = vec![spawn_invoice_sweep(
            invoices.clone(),
            Duration::from_secs(app_cfg.invoicing.retry_sweep_secs.max(1)),
            signal.clone(),
        )];
        if let Some(path) = opts.config_path {
            tasks.push(spawn_rate_reloader(rates.clone(), path, signal.clone()));
        }

        info!(
            rate_version = rates.snapshot().version(),
            "Freight billing started"
        );

        Ok(Self {
            repos,
            rates,
            event_bus,
            packages,
            shipments,
            wallets,
            invoices,
            config: app_cfg,
            db,
            shutdown,
            tasks,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown (non-blocking).
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for shutdown, stop background tasks, and close the database.
    pub async fn wait(self) {
        let Self {
            shutdown, tasks, db, ..
        } = self;

        let completed = shutdown
            .shutdown_with_cleanup(|| async move {
                for task in tasks {
                    if let Err(e) = task.await {
                        error!("Background task panicked: {}", e);
                    }
                }
                if let Err(e) = db.close().await {
                    warn!("Error closing database connection: {}", e);
                } else {
                    info!("Database connection closed");
                }
            })
            .await;
        if !completed {
            warn!("Shutdown did not finish cleanly");
        }
        info!("Freight billing shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("Shutting down freight billing...");
        self.trigger_shutdown();
        self.wait().await;
    }

    /// Check if any background task is still running.
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn install_metrics(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    match &config.metrics.listen {
        Some(addr) => {
            let addr: std::net::SocketAddr = addr.parse()?;
            builder.with_http_listener(addr).install()?;
            info!("Prometheus metrics exposed on http://{}/metrics", addr);
        }
        None => {
            builder.install_recorder()?;
            info!("Prometheus metrics recorder installed");
        }
    }
    Ok(())
}

/// Re-attempt failed invoices on an interval until shutdown.
fn spawn_invoice_sweep(
    invoices: Arc<InvoiceService>,
    every: Duration,
    shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick fires immediately; skip it so startup stays quiet
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = invoices.retry_failed().await {
                        warn!(error = %e, "Invoice retry sweep failed");
                    }
                }
                _ = shutdown.wait() => break,
            }
        }
        info!("Invoice retry sweep stopped");
    })
}

/// Publish a fresh rate table from the config file on every SIGHUP.
fn spawn_rate_reloader(
    rates: Arc<RateTableStore>,
    path: PathBuf,
    shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut hangup = match signal(SignalKind::hangup()) {
                Ok(s) => s,
                Err(e) => {
                    error!("Failed to install SIGHUP handler: {}", e);
                    return;
                }
            };
            loop {
                tokio::select! {
                    _ = hangup.recv() => {
                        info!("Received SIGHUP, reloading rates from {}", path.display());
                        match rates.reload_from(&path) {
                            Ok(table) => info!(version = table.version(), "Rate table reloaded"),
                            // Keep serving the previous table
                            Err(e) => error!(error = %e, "Rate table reload failed"),
                        }
                    }
                    _ = shutdown.wait() => break,
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = (rates, path);
            shutdown.wait().await;
        }
    })
}

/// Initialize tracing from the logging section; `RUST_LOG` wins when set.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
