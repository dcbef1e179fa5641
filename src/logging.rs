//! Logging utilities for the weabase server.
//!
//! Structured `tracing` events with consistent field names so query and
//! decode activity can be filtered per station, file or request. Queries that
//! simply find no data are logged at `warn`, everything else that fails at
//! `error`.

use std::path::Path;
use std::time::Instant;

use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::error::WeaError;
use crate::wea_file::Header;

/// Tracing layer for HTTP requests: one span per request, responses at debug
pub fn create_http_trace_layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    DefaultMakeSpan,
    DefaultOnRequest,
    DefaultOnResponse,
> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::DEBUG)
                .latency_unit(LatencyUnit::Micros),
        )
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `log_level`.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

pub fn log_operation_start(operation: &str, station: Option<&str>) {
    debug!(
        operation = operation,
        station = station.unwrap_or("-"),
        "Starting operation"
    );
}

/// `found_data` is false when the operation ran but had nothing to return
pub fn log_operation_end(operation: &str, started: Instant, found_data: bool) {
    let duration_us = started.elapsed().as_micros() as u64;
    if found_data {
        info!(operation = operation, duration_us = duration_us, "Operation completed");
    } else {
        warn!(
            operation = operation,
            duration_us = duration_us,
            "Operation found no usable data"
        );
    }
}

/// Run `f`, logging how long it took
pub fn log_timed_operation<F, R>(operation: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let started = Instant::now();
    debug!(operation = operation, "Starting timed operation");
    let result = f();
    info!(
        operation = operation,
        duration_us = started.elapsed().as_micros() as u64,
        "Timed operation finished"
    );
    result
}

/// Log the layout of a freshly opened data file
pub fn log_file_open_stats(path: &Path, header: &Header, mode: &str) {
    debug!(
        operation = "file_open",
        path = %path.display(),
        mode = mode,
        oi = header.oi,
        ne = header.ne,
        rows = header.rows(),
        pcodes = %header.pcodes.join(","),
        "Opened wea file"
    );
}

pub fn log_error(error: &WeaError, context: &str) {
    if error.is_no_data() {
        warn!(error = %error, context = context, "No data");
    } else {
        error!(error = %error, context = context, "Error occurred");
    }
}

/// Log a failed request with the endpoint and its parameters
pub fn log_request_error(error: &WeaError, endpoint: &str, request_id: &str, params: Option<&str>) {
    let params = params.unwrap_or("none");
    if error.is_no_data() {
        warn!(
            error = %error,
            endpoint = endpoint,
            request_id = request_id,
            params = params,
            "Request found no data"
        );
    } else {
        error!(
            error = %error,
            endpoint = endpoint,
            request_id = request_id,
            params = params,
            "Request processing error"
        );
    }
}

pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}
