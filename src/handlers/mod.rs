//! HTTP request handlers for the weabase API.
//!
//! Handlers only parse arguments and shape responses; the synchronous query
//! core runs on the blocking pool.

pub mod data;
pub mod metadata;
pub mod recent;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use tower_http::cors::CorsLayer;

use crate::error::WeaError;
use crate::logging::{create_http_trace_layer, log_request_error};
use crate::state::AppState;

pub use data::{data_handler, single_day_handler};
pub use metadata::{routes_handler, station_dates_handler};
pub use recent::recent_handler;

/// Every exposed route and the endpoint serving it
pub const ROUTES: [(&str, &str); 5] = [
    ("/", "list_routes"),
    ("/getData", "get_data"),
    ("/getDataSingleDay", "get_data_single_day"),
    ("/getMostRecentData", "get_most_recent_data"),
    ("/getStnDates", "get_stn_dates"),
];

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes_handler))
        .route("/getData", get(data_handler))
        .route("/getDataSingleDay", get(single_day_handler))
        .route("/getMostRecentData", get(recent_handler))
        .route("/getStnDates", get(station_dates_handler))
        .layer(create_http_trace_layer())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Parse `YYYY-MM-DD[-HH[-MM]]`
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let parts: Vec<u32> = value
        .split('-')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    if !(3..=5).contains(&parts.len()) {
        return None;
    }
    let hour = parts.get(3).copied().unwrap_or(0);
    let minute = parts.get(4).copied().unwrap_or(0);
    NaiveDate::from_ymd_opt(i32::try_from(parts[0]).ok()?, parts[1], parts[2])?
        .and_hms_opt(hour, minute, 0)
}

/// Names of required arguments that were not supplied
pub fn missing_arguments(args: &[(&str, &Option<String>)]) -> Option<String> {
    let missing: Vec<&str> = args
        .iter()
        .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(format!("Arguments required: {}", missing.join(",")))
    }
}

/// Split a comma-separated element list
pub fn parse_codes(vars: Option<&str>) -> Option<Vec<String>> {
    let codes: Vec<String> = vars?
        .split(',')
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect();
    if codes.is_empty() {
        None
    } else {
        Some(codes)
    }
}

/// A JSON `{"error": ...}` body with the given status
pub fn error_json(status: StatusCode, message: &str, request_id: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": message,
            "request_id": request_id
        })),
    )
        .into_response()
}

/// HTTP status for a failed query
pub fn status_for(error: &WeaError) -> StatusCode {
    match error {
        WeaError::FileUnavailable { .. } | WeaError::NoValidRecord { .. } => StatusCode::NOT_FOUND,
        WeaError::InvalidRange { .. }
        | WeaError::InvalidParameter { .. }
        | WeaError::InvalidMonth { .. }
        | WeaError::RangeTooLarge { .. }
        | WeaError::UnknownVariable { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Log a failed query and turn it into a response
pub fn handle_query_error(
    error: WeaError,
    endpoint: &str,
    request_id: &str,
    params: &str,
) -> Response {
    log_request_error(&error, endpoint, request_id, Some(params));
    error_json(status_for(&error), &client_message(&error), request_id)
}

/// What a client is told about a failed query. Server paths and internal
/// failures stay in the log.
pub fn client_message(error: &WeaError) -> String {
    if error.is_no_data() {
        return "No data available.".to_string();
    }
    match error {
        WeaError::UnknownVariable { code, .. } => format!("Unknown variable {}", code),
        _ if status_for(error).is_server_error() => "Internal server error".to_string(),
        _ => error.to_string(),
    }
}

/// Response for a blocking task that panicked or was cancelled
pub fn task_failed(error: tokio::task::JoinError, endpoint: &str, request_id: &str) -> Response {
    let error = WeaError::Server {
        message: format!("query task failed: {}", error),
    };
    log_request_error(&error, endpoint, request_id, None);
    error_json(StatusCode::INTERNAL_SERVER_ERROR, &error.to_string(), request_id)
}
