//! # weabase
//!
//! Read-only access to minute-resolution weather-station observations stored
//! as one fixed-layout binary file per station per month.
//!
//! Arbitrary date-range queries are answered by opening every monthly file the
//! range touches, slicing each file's column for the requested element and
//! stitching the slices into one chronological sequence, optionally converted
//! into another unit system.
//!
//! ## Architecture
//!
//! - **Calendar**: month lengths, minute arithmetic, grid rounding and file naming
//! - **Decoder**: header parsing and memory-mapped access to one month's matrix
//! - **Catalog**: element metadata and linear unit conversions
//! - **Series**: multi-file stitching for a station and date range
//! - **API Layer**: listing products exposed over HTTP

pub mod calendar;
pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod meta;
pub mod products;
pub mod series;
pub mod state;
pub mod wea_file;

pub use catalog::{ConversionEntry, DisplayFormat, ElementCatalog, ElementMetadata, UnitSystem};
pub use config::Config;
pub use error::{Result, WeaError};
pub use logging::{
    create_http_trace_layer, generate_request_id, init_tracing, log_error, log_file_open_stats,
    log_operation_end, log_operation_start, log_request_error, log_timed_operation,
};
pub use series::{query, ElementSeries, QueryResult, SeriesOptions, StationSeries};
pub use state::AppState;
pub use wea_file::{Header, LatestRecord, WeaFile};
