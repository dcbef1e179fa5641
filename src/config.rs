//! Configuration management for weabase.
//!
//! This module handles the layered configuration system with the following precedence:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. JSON config file
//! 4. Default values (lowest priority)

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, WeaError};
use crate::series::{SeriesOptions, DEFAULT_MAX_MONTHS};
use crate::wea_file::DEFAULT_MISSING_SENTINEL;

/// Command-line arguments for weabase
#[derive(Parser, Debug)]
#[command(name = "weabase")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Root directory holding one sub-directory of .wea files per station
    pub data_dir: PathBuf,

    /// Host address to bind to
    #[arg(short = 'H', long, env = "WEABASE_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "WEABASE_PORT")]
    pub port: Option<u16>,

    /// Path to JSON configuration file
    #[arg(short, long, env = "WEABASE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "WEABASE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Values at or above this are treated as missing observations
    #[arg(long, env = "WEABASE_MISSING_SENTINEL")]
    pub missing_sentinel: Option<f32>,

    /// Maximum number of months a single query may span
    #[arg(long, env = "WEABASE_MAX_MONTHS")]
    pub max_months: Option<usize>,

    /// Element table (pcode, name, scaling, format code)
    #[arg(long, env = "WEABASE_ELEMENTS_FILE")]
    pub elements_file: Option<PathBuf>,

    /// Element units table (pcode, units, descriptions)
    #[arg(long, env = "WEABASE_WEA_ELEMENTS_FILE")]
    pub wea_elements_file: Option<PathBuf>,

    /// Unit conversion table (system, from, to, multiplier, offset)
    #[arg(long, env = "WEABASE_CONVERSIONS_FILE")]
    pub conversions_file: Option<PathBuf>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Data access configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Root of the station directories
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Values at or above this are missing
    #[serde(default = "default_missing_sentinel")]
    pub missing_sentinel: f32,

    /// Maximum months per query
    #[serde(default = "default_max_months")]
    pub max_months: usize,
}

/// Element catalog tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub elements_file: Option<PathBuf>,
    #[serde(default)]
    pub wea_elements_file: Option<PathBuf>,
    #[serde(default)]
    pub conversions_file: Option<PathBuf>,
}

/// Complete configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Data configuration
    #[serde(default)]
    pub data: DataConfig,

    /// Catalog configuration
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with proper precedence
    pub fn load() -> Result<(Self, PathBuf)> {
        let args = Args::parse();
        Self::from_args(args)
    }

    /// Build configuration from already-parsed arguments
    pub fn from_args(args: Args) -> Result<(Self, PathBuf)> {
        let mut config = Config::default();

        if let Some(config_path) = &args.config {
            let json_config = Self::load_from_file(config_path)?;
            config.merge(json_config);
        }

        if let Some(host) = args.host {
            config.server.host = host;
        }
        if let Some(port) = args.port {
            config.server.port = port;
        }
        if let Some(log_level) = args.log_level {
            config.log_level = log_level;
        }
        if let Some(sentinel) = args.missing_sentinel {
            config.data.missing_sentinel = sentinel;
        }
        if let Some(max_months) = args.max_months {
            config.data.max_months = max_months;
        }
        if args.elements_file.is_some() {
            config.catalog.elements_file = args.elements_file;
        }
        if args.wea_elements_file.is_some() {
            config.catalog.wea_elements_file = args.wea_elements_file;
        }
        if args.conversions_file.is_some() {
            config.catalog.conversions_file = args.conversions_file;
        }

        // Data directory from command line takes precedence
        let data_dir = args.data_dir;
        config.data.data_dir = Some(data_dir.clone());

        Ok((config, data_dir))
    }

    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        self.server = other.server;
        if other.data.data_dir.is_some() {
            self.data.data_dir = other.data.data_dir;
        }
        self.data.missing_sentinel = other.data.missing_sentinel;
        self.data.max_months = other.data.max_months;
        if other.catalog.elements_file.is_some() {
            self.catalog.elements_file = other.catalog.elements_file;
        }
        if other.catalog.wea_elements_file.is_some() {
            self.catalog.wea_elements_file = other.catalog.wea_elements_file;
        }
        if other.catalog.conversions_file.is_some() {
            self.catalog.conversions_file = other.catalog.conversions_file;
        }
        self.log_level = other.log_level;
    }

    /// Query tunables derived from the data section
    pub fn series_options(&self) -> SeriesOptions {
        SeriesOptions {
            missing_sentinel: self.data.missing_sentinel,
            max_months: self.data.max_months,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(WeaError::Config {
                message: "Server host cannot be empty".to_string(),
            });
        }

        if self.server.port == 0 {
            return Err(WeaError::Config {
                message: "Server port cannot be 0".to_string(),
            });
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(WeaError::Config {
                    message: format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        self.log_level
                    ),
                });
            }
        }

        if !(self.data.missing_sentinel > 0.0) {
            return Err(WeaError::Config {
                message: format!(
                    "Missing sentinel must be positive, got {}",
                    self.data.missing_sentinel
                ),
            });
        }

        if self.data.max_months == 0 {
            return Err(WeaError::Config {
                message: "max_months must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            data: DataConfig::default(),
            catalog: CatalogConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            missing_sentinel: default_missing_sentinel(),
            max_months: default_max_months(),
        }
    }
}

// Default value functions for serde
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_missing_sentinel() -> f32 {
    DEFAULT_MISSING_SENTINEL
}

fn default_max_months() -> usize {
    DEFAULT_MAX_MONTHS
}

fn default_log_level() -> String {
    "info".to_string()
}
