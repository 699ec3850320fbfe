//! Configuration module
//!
//! Loaded from a TOML file (default `<config dir>/freight-billing/config.toml`).
//! Every section has defaults, so a missing key never prevents startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::pricing::{PricingConstants, RateCategory, RateTable};
use crate::shared::retry::RetryConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("freight-billing")
        .join("config.toml")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSection,
    pub logging: LoggingSection,
    pub metrics: MetricsSection,
    pub pricing: PricingSection,
    pub invoicing: InvoicingSection,
    pub files: FilesSection,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config
            .pricing
            .to_rate_table()
            .validate()
            .map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite://./freight.db?mode=rwc".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    /// Prometheus listener address, e.g. "0.0.0.0:9100"; disabled when unset
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingSection {
    pub default_category: String,
    /// Reject unknown category keys instead of billing the default category
    pub strict_categories: bool,
    pub volume_divisor: Decimal,
    pub cbm_to_volumetric_factor: Decimal,
    pub minimum_charge: i64,
    pub oversized_limit_cm: Decimal,
    pub oversized_fee: i64,
    pub overweight_limit_kg: Decimal,
    pub overweight_fee: i64,
    pub categories: Vec<RateCategory>,
}

impl Default for PricingSection {
    fn default() -> Self {
        let table = RateTable::default();
        let c = table.constants().clone();
        Self {
            default_category: table.default_category_key().to_string(),
            strict_categories: table.is_strict(),
            volume_divisor: c.volume_divisor,
            cbm_to_volumetric_factor: c.cbm_to_volumetric_factor,
            minimum_charge: c.minimum_charge,
            oversized_limit_cm: c.oversized_limit_cm,
            oversized_fee: c.oversized_fee,
            overweight_limit_kg: c.overweight_limit_kg,
            overweight_fee: c.overweight_fee,
            categories: table.categories().to_vec(),
        }
    }
}

impl PricingSection {
    pub fn to_rate_table(&self) -> RateTable {
        RateTable::new(
            self.default_category.clone(),
            self.strict_categories,
            self.categories.clone(),
            PricingConstants {
                volume_divisor: self.volume_divisor,
                cbm_to_volumetric_factor: self.cbm_to_volumetric_factor,
                minimum_charge: self.minimum_charge,
                oversized_limit_cm: self.oversized_limit_cm,
                oversized_fee: self.oversized_fee,
                overweight_limit_kg: self.overweight_limit_kg,
                overweight_fee: self.overweight_fee,
            },
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoicingSection {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Interval of the failed-invoice sweep in the server binary
    pub retry_sweep_secs: u64,
    /// Age after which an unfinished issuance claim is retried by the sweep
    pub claim_lease_secs: u64,
}

impl Default for InvoicingSection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 200,
            max_delay_ms: 5_000,
            retry_sweep_secs: 300,
            claim_lease_secs: 600,
        }
    }
}

impl InvoicingSection {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn claim_lease(&self) -> chrono::Duration {
        let secs = self.claim_lease_secs.min(i64::MAX as u64 / 1_000) as i64;
        chrono::Duration::seconds(secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesSection {
    /// Root directory that relative file references resolve against
    pub root: PathBuf,
}

impl Default for FilesSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./uploads"),
        }
    }
}
