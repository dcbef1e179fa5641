//! Metadata endpoint handlers.
//!
//! Lists the exposed routes and the months a station has data for.

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

use crate::logging::generate_request_id;
use crate::products::get_station_dates;
use crate::state::AppState;

use super::{error_json, handle_query_error, missing_arguments, task_failed, ROUTES};

/// Query parameters for the station dates endpoint
#[derive(Debug, Deserialize)]
pub struct StationQuery {
    /// Station identifier
    pub stn: Option<String>,
}

/// Handle GET / requests
pub async fn routes_handler() -> Json<serde_json::Value> {
    let routes: Vec<(&str, &str)> = ROUTES
        .iter()
        .copied()
        .filter(|(path, _)| *path != "/")
        .collect();
    Json(serde_json::json!({ "routes": routes }))
}

/// Handle GET /getStnDates requests
pub async fn station_dates_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StationQuery>,
) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();

    debug!(
        endpoint = "/getStnDates",
        request_id = %request_id,
        stn = ?params.stn,
        "Processing station dates request"
    );

    if let Some(message) = missing_arguments(&[("stn", &params.stn)]) {
        return error_json(StatusCode::BAD_REQUEST, &message, &request_id);
    }
    let stn = params.stn.clone().unwrap_or_default();
    let describe = format!("stn={}", stn);

    let result =
        tokio::task::spawn_blocking(move || get_station_dates(state.data_dir(), &stn)).await;

    match result {
        Ok(Ok(dates)) => {
            info!(
                endpoint = "/getStnDates",
                request_id = %request_id,
                months = dates.dates.len(),
                duration_us = start_time.elapsed().as_micros() as u64,
                "Station dates request successful"
            );
            Json(dates).into_response()
        }
        Ok(Err(error)) => handle_query_error(error, "/getStnDates", &request_id, &describe),
        Err(error) => task_failed(error, "/getStnDates", &request_id),
    }
}
