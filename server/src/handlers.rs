//! API handlers for the FlightSurety backend

use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;

use crate::app_state::AppState;
use crate::models::{ApiResponse, OracleResponse, SimulatedOracle, StatusRequest};
use crate::services::oracle_pool::INDEX_RANGE;

pub async fn root() -> &'static str {
    "FlightSurety API Server"
}

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn api_greeting() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::ok(json!({
        "message": "An API for use with your Dapp!"
    })))
}

/// List the simulated oracles and their assigned indices.
pub async fn list_oracles(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<Vec<SimulatedOracle>>> {
    Json(ApiResponse::ok(app_state.oracle_pool.oracles().to_vec()))
}

/// Run one canvass round through the pool and return every eligible
/// oracle's answer. Mirrors what the event listener does when it sees an
/// on-chain request, but driven from the API for manual testing.
pub async fn submit_flight_status(
    State(app_state): State<AppState>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<ApiResponse<Vec<OracleResponse>>>, (StatusCode, Json<ApiResponse<Vec<OracleResponse>>>)>
{
    if request.index >= INDEX_RANGE {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::err(format!(
                "index must be below {}",
                INDEX_RANGE
            ))),
        ));
    }

    let responses = app_state.oracle_pool.respond(&request);
    tracing::info!(
        flight = %request.flight,
        index = request.index,
        responses = responses.len(),
        "canvass round answered"
    );

    Ok(Json(ApiResponse::ok(responses)))
}
