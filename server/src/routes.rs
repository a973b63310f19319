//! Route definitions for the FlightSurety API

use axum::{routing::get, Router};

use crate::app_state::AppState;
use crate::handlers::*;

// Oracle routes
pub fn oracle_routes() -> Router<AppState> {
    Router::new().route("/api/oracles", get(list_oracles))
}

// Flight routes
pub fn flight_routes() -> Router<AppState> {
    Router::new().route(
        "/api/flights/status",
        axum::routing::post(submit_flight_status),
    )
}

// Greeting kept for dapp compatibility
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/api", get(api_greeting))
}
