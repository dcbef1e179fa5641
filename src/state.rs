//! Application state management for weabase.
//!
//! This module defines the shared state that is passed to all handlers: the
//! configuration, the data root and the read-only element catalog. No query
//! state lives here; every request opens its own files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::ElementCatalog;
use crate::config::Config;
use crate::error::{Result, WeaError};
use crate::logging::log_timed_operation;
use crate::products::ProductContext;
use crate::series::SeriesOptions;

/// The main application state shared across all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Root of the station directories
    pub data_dir: PathBuf,
    /// Element metadata and unit conversions
    pub catalog: Arc<ElementCatalog>,
    /// Query tunables
    pub options: SeriesOptions,
}

impl AppState {
    /// Create a new AppState
    pub fn new(config: Config, data_dir: PathBuf, catalog: ElementCatalog) -> Self {
        let options = config.series_options();
        Self {
            config,
            data_dir,
            catalog: Arc::new(catalog),
            options,
        }
    }

    /// Create a new AppState wrapped in an Arc for shared ownership
    pub fn new_shared(config: Config, data_dir: PathBuf, catalog: ElementCatalog) -> Arc<Self> {
        Arc::new(Self::new(config, data_dir, catalog))
    }

    /// Build state from configuration, loading the catalog tables it names
    pub fn from_config(config: Config, data_dir: PathBuf) -> Result<Self> {
        let catalog = log_timed_operation("catalog_load", || {
            ElementCatalog::load(
                config.catalog.elements_file.as_deref(),
                config.catalog.wea_elements_file.as_deref(),
                config.catalog.conversions_file.as_deref(),
            )
        })?;
        Ok(Self::new(config, data_dir, catalog))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Borrowed view used by the product functions
    pub fn products(&self) -> ProductContext<'_> {
        ProductContext {
            data_dir: &self.data_dir,
            catalog: &self.catalog,
            options: &self.options,
        }
    }

    /// Validate that the application state is consistent and ready for use
    pub fn validate(&self) -> Result<()> {
        if !self.data_dir.is_dir() {
            return Err(WeaError::Config {
                message: format!(
                    "Data directory {} does not exist or is not a directory",
                    self.data_dir.display()
                ),
            });
        }

        if self.catalog.is_empty() {
            tracing::warn!("Element catalog is empty; unit conversion is disabled");
        }

        Ok(())
    }
}
