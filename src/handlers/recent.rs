//! Most-recent-record endpoint handler.
//!
//! Returns the newest complete observation for a station with units.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::catalog::UnitSystem;
use crate::logging::generate_request_id;
use crate::products::get_most_recent_data;
use crate::state::AppState;

use super::{error_json, handle_query_error, missing_arguments, task_failed};

/// Query parameters for the recent endpoint
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    /// Station identifier
    pub stn: Option<String>,
    /// Unit system selector
    pub units: Option<String>,
}

/// Handle GET /getMostRecentData requests
pub async fn recent_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentQuery>,
) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();

    debug!(
        endpoint = "/getMostRecentData",
        request_id = %request_id,
        stn = ?params.stn,
        "Processing most recent query"
    );

    if let Some(message) = missing_arguments(&[("stn", &params.stn)]) {
        return error_json(StatusCode::BAD_REQUEST, &message, &request_id);
    }

    let stn = params.stn.clone().unwrap_or_default();
    let unit_system = UnitSystem::parse(params.units.as_deref().unwrap_or_default());
    let describe = format!("stn={}, units={}", stn, unit_system.label());

    let result = tokio::task::spawn_blocking(move || {
        get_most_recent_data(&state.products(), &stn, &unit_system)
    })
    .await;

    match result {
        Ok(Ok(record)) => {
            info!(
                endpoint = "/getMostRecentData",
                request_id = %request_id,
                timestamp = %record.timestamp,
                duration_us = start_time.elapsed().as_micros() as u64,
                "Most recent query successful"
            );
            Json(record).into_response()
        }
        Ok(Err(error)) => handle_query_error(error, "/getMostRecentData", &request_id, &describe),
        Err(error) => task_failed(error, "/getMostRecentData", &request_id),
    }
}
