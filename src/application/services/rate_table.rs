//! Rate table snapshot store
//!
//! Readers take one immutable snapshot per calculation; writers publish a
//! whole new table. An in-flight calculation keeps the `Arc` it started
//! with, so a concurrent update can never be observed half-way.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::config::{AppConfig, ConfigError};
use crate::domain::pricing::RateTable;
use crate::domain::{DomainError, DomainResult};

pub struct RateTableStore {
    current: ArcSwap<RateTable>,
}

impl RateTableStore {
    pub fn new(table: RateTable) -> DomainResult<Self> {
        table.validate().map_err(DomainError::Validation)?;
        info!(
            version = table.version(),
            categories = table.categories().len(),
            "Rate table loaded"
        );
        Ok(Self {
            current: ArcSwap::from_pointee(table),
        })
    }

    /// Current table (lock-free).
    #[inline]
    pub fn snapshot(&self) -> Arc<RateTable> {
        self.current.load_full()
    }

    /// Validate and atomically replace the current table.
    pub fn publish(&self, table: RateTable) -> DomainResult<Arc<RateTable>> {
        table.validate().map_err(DomainError::Validation)?;
        let table = Arc::new(table);
        let previous = self.current.swap(table.clone());
        info!(
            previous = previous.version(),
            version = table.version(),
            "Rate table published"
        );
        Ok(table)
    }

    /// Re-read the `[pricing]` section of a config file and publish it.
    pub fn reload_from(&self, path: &Path) -> Result<Arc<RateTable>, ConfigError> {
        let config = AppConfig::load(path)?;
        self.publish(config.pricing.to_rate_table())
            .map_err(|e| ConfigError::Validation(e.to_string()))
    }
}

impl Default for RateTableStore {
    fn default() -> Self {
        Self {
            current: ArcSwap::from_pointee(RateTable::default()),
        }
    }
}
