//! Handlers for the `/getData` and `/getDataSingleDay` endpoints.
//!
//! Both return every requested element (or every element the station records)
//! at the station's native interval, optionally converted into another unit
//! system.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::{debug, info};

use crate::catalog::UnitSystem;
use crate::logging::generate_request_id;
use crate::products::{get_data, get_data_single_day};
use crate::state::AppState;

use super::{error_json, handle_query_error, missing_arguments, parse_codes, parse_date, task_failed};

/// Query parameters shared by the data endpoints
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DataQuery {
    /// Station identifier
    pub stn: Option<String>,

    /// Start, `YYYY-MM-DD[-HH[-MM]]`
    #[serde(rename = "sD")]
    pub start: Option<String>,

    /// End, `YYYY-MM-DD[-HH[-MM]]`
    #[serde(rename = "eD")]
    pub end: Option<String>,

    /// Unit system selector, "N" for native
    #[serde(default)]
    pub units: Option<String>,

    /// Optional comma-separated element codes
    #[serde(default)]
    pub vars: Option<String>,
}

impl DataQuery {
    fn describe(&self) -> String {
        format!(
            "stn={:?}, sD={:?}, eD={:?}, units={:?}, vars={:?}",
            self.stn, self.start, self.end, self.units, self.vars
        )
    }

    fn unit_system(&self) -> UnitSystem {
        UnitSystem::parse(self.units.as_deref().unwrap_or_default())
    }
}

/// Handle GET /getData requests
pub async fn data_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DataQuery>,
) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();

    debug!(
        endpoint = "/getData",
        request_id = %request_id,
        params = %params.describe(),
        "Processing data query"
    );

    if let Some(message) = missing_arguments(&[
        ("stn", &params.stn),
        ("sD", &params.start),
        ("eD", &params.end),
    ]) {
        return error_json(StatusCode::BAD_REQUEST, &message, &request_id);
    }
    let (Some(start), Some(end)) = (
        params.start.as_deref().and_then(parse_date),
        params.end.as_deref().and_then(parse_date),
    ) else {
        return error_json(
            StatusCode::BAD_REQUEST,
            "'sD' and 'eD' must be formatted YYYY-MM-DD[-HH[-MM]]",
            &request_id,
        );
    };

    let stn = params.stn.clone().unwrap_or_default();
    let codes = parse_codes(params.vars.as_deref());
    let unit_system = params.unit_system();

    let result = tokio::task::spawn_blocking(move || {
        get_data(
            &state.products(),
            &stn,
            start,
            end,
            codes.as_deref(),
            unit_system,
        )
    })
    .await;

    match result {
        Ok(Ok(listing)) => {
            info!(
                endpoint = "/getData",
                request_id = %request_id,
                elements = listing.data.len(),
                duration_us = start_time.elapsed().as_micros() as u64,
                "Data query successful"
            );
            Json(listing).into_response()
        }
        Ok(Err(error)) => handle_query_error(error, "/getData", &request_id, &params.describe()),
        Err(error) => task_failed(error, "/getData", &request_id),
    }
}

/// Handle GET /getDataSingleDay requests
pub async fn single_day_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DataQuery>,
) -> Response {
    let request_id = generate_request_id();
    let start_time = Instant::now();

    debug!(
        endpoint = "/getDataSingleDay",
        request_id = %request_id,
        params = %params.describe(),
        "Processing single day query"
    );

    if let Some(message) = missing_arguments(&[("stn", &params.stn), ("sD", &params.start)]) {
        return error_json(StatusCode::BAD_REQUEST, &message, &request_id);
    }
    let Some(day) = params.start.as_deref().and_then(parse_date) else {
        return error_json(
            StatusCode::BAD_REQUEST,
            "'sD' must be formatted YYYY-MM-DD",
            &request_id,
        );
    };

    let stn = params.stn.clone().unwrap_or_default();
    let codes = parse_codes(params.vars.as_deref());
    let unit_system = params.unit_system();

    let result = tokio::task::spawn_blocking(move || {
        get_data_single_day(
            &state.products(),
            &stn,
            day.date(),
            codes.as_deref(),
            unit_system,
        )
    })
    .await;

    match result {
        Ok(Ok(listing)) => {
            info!(
                endpoint = "/getDataSingleDay",
                request_id = %request_id,
                elements = listing.data.len(),
                duration_us = start_time.elapsed().as_micros() as u64,
                "Single day query successful"
            );
            Json(listing).into_response()
        }
        Ok(Err(error)) => {
            handle_query_error(error, "/getDataSingleDay", &request_id, &params.describe())
        }
        Err(error) => task_failed(error, "/getDataSingleDay", &request_id),
    }
}
