//! Error types for the weabase library.
//!
//! Every failure aborts the whole query; nothing here is retried and no
//! partial results are handed back to callers.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use thiserror::Error;

/// The main error type for weabase operations.
#[derive(Error, Debug)]
pub enum WeaError {
    /// A monthly data file is missing or cannot be read
    #[error("No data available: {}: {source}", .path.display())]
    FileUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Header carries an observation interval with no sampling factors
    #[error("Unsupported sampling interval {oi} in {}", .path.display())]
    UnsupportedSamplingInterval { path: PathBuf, oi: i16 },

    /// Stitched files disagree on their observation interval
    #[error(
        "Inconsistent sampling interval in {}: expected {expected}, found {found}",
        .path.display()
    )]
    InconsistentSamplingInterval {
        path: PathBuf,
        expected: u32,
        found: u32,
    },

    /// Requested element code is not present in a file
    #[error("Unknown variable {code} in {}", .file.display())]
    UnknownVariable { file: PathBuf, code: String },

    /// Start of the requested range lies after its end
    #[error("Invalid range: start {start} is after end {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    /// Calendar arithmetic was given a month outside 1-12
    #[error("Invalid month {month} for year {year}")]
    InvalidMonth { month: u32, year: i32 },

    /// No row in the scanned file is free of missing values
    #[error("No valid record found in {}", .path.display())]
    NoValidRecord { path: PathBuf },

    /// File contents or name do not match the fixed layout
    #[error("Malformed file {}: {message}", .path.display())]
    MalformedFile { path: PathBuf, message: String },

    /// Requested range spans more months than the configured guard
    #[error("Range spans {months} months, limit is {limit}")]
    RangeTooLarge { months: usize, limit: usize },

    /// Element or conversion table could not be parsed
    #[error("Catalog error: {message}")]
    Catalog { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Invalid parameter errors
    #[error("Invalid parameter: {param} - {message}")]
    InvalidParameter { param: String, message: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server errors
    #[error("Server error: {message}")]
    Server { message: String },
}

impl WeaError {
    /// Wrap an I/O failure on a data file
    pub fn file_unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WeaError::FileUnavailable {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the station simply has no data for the request
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            WeaError::FileUnavailable { .. } | WeaError::NoValidRecord { .. }
        )
    }
}

/// Convenience type alias for Results with WeaError
pub type Result<T> = std::result::Result<T, WeaError>;
