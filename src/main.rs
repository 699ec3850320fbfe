//! Freight billing daemon
//!
//! ```sh
//! # Run with default config (~/.config/freight-billing/config.toml)
//! freight-billing
//!
//! # Custom config path
//! freight-billing --config /etc/freight-billing/config.toml
//!
//! # Validate config without starting
//! freight-billing --check
//! ```
//!
//! Send SIGHUP to reload the `[pricing]` section without restarting.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use freight_billing::config::AppConfig;
use freight_billing::default_config_path;
use freight_billing::server::{init_tracing, ServerHandle, ServerOptions};

/// Freight consolidation billing engine.
#[derive(Parser, Debug)]
#[command(
    name = "freight-billing",
    version,
    about = "Freight consolidation billing engine",
    long_about = "Prices warehouse-measured boxes, consolidates packages into \
                  shipments, keeps customer wallets, and issues invoices.\n\n\
                  Default config: ~/.config/freight-billing/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "FREIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.unwrap_or_else(default_config_path);

    let config = match AppConfig::load(&config_path) {
        Ok(mut cfg) => {
            if let Some(ref level) = cli.log_level {
                cfg.logging.level = level.clone();
            }
            init_tracing(&cfg);
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            if cli.check {
                eprintln!("Configuration is invalid: {}", e);
                return Err(e.into());
            }
            let mut cfg = AppConfig::default();
            if let Some(ref level) = cli.log_level {
                cfg.logging.level = level.clone();
            }
            init_tracing(&cfg);
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
            cfg
        }
    };

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        let table = config.pricing.to_rate_table();
        println!("Configuration is valid");
        println!("   Config file  : {}", config_path.display());
        println!("   Database     : {}", config.database.url);
        println!("   Rate version : {}", table.version());
        println!("   Categories   : {}", table.categories().len());
        println!("   Log level    : {}", config.logging.level);
        return Ok(());
    }

    // ── Start daemon ───────────────────────────────────────────
    let handle = ServerHandle::start(ServerOptions {
        config,
        config_path: Some(config_path),
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    // Install OS signal handlers (SIGTERM, SIGINT)
    handle.install_signal_handler();

    info!("Press Ctrl+C to shutdown gracefully.");

    handle.wait().await;

    Ok(())
}
