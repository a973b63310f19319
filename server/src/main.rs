//! FlightSurety Backend Server
//!
//! Rust backend for the FlightSurety protocol: serves the dapp API and
//! runs the simulated oracle fleet that watches the flight-oracle
//! contract for canvass rounds and submits status responses.

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tokio::time::{sleep, Duration};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use flight_surety_server::app_state::AppState;
use flight_surety_server::config::Config;
use flight_surety_server::event_listener::{EventListener, StartError};
use flight_surety_server::handlers::{health_check, root};
use flight_surety_server::routes;

const LISTENER_SUPERVISOR_MAX_BACKOFF_SECONDS: u64 = 30;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    let port = config.port;
    let state = AppState::new(config);

    info!(
        oracles = state.oracle_pool.oracles().len(),
        "oracle pool provisioned"
    );

    // Create the app router
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(routes::api_routes())
        .merge(routes::oracle_routes())
        .merge(routes::flight_routes())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
        .with_state(state.clone());

    // Start and supervise the background contract event listener.
    tokio::spawn(async move {
        let mut restart_count: u32 = 0;
        loop {
            let listener = EventListener::new(&state.config, state.oracle_pool.clone());
            let handle = tokio::spawn(async move { listener.start().await });

            match handle.await {
                Ok(Ok(())) => {
                    info!("event listener exited cleanly; stopping supervisor");
                    break;
                }
                Ok(Err(StartError::NoContractConfigured)) => {
                    info!("Listener disabled: no ORACLE_CONTRACT_ID set in environment");
                    break;
                }
                Err(join_error) => {
                    if join_error.is_panic() {
                        error!("event listener panicked; restarting");
                    } else {
                        error!(error = %join_error, "event listener task failed; restarting");
                    }
                }
            }

            restart_count = restart_count.saturating_add(1);
            let backoff_seconds = (2u64.saturating_pow(restart_count.min(5)))
                .min(LISTENER_SUPERVISOR_MAX_BACKOFF_SECONDS);
            warn!(restart_count, backoff_seconds, "event listener restart backoff");
            sleep(Duration::from_secs(backoff_seconds)).await;
        }
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    tracing::info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

fn build_cors_layer() -> CorsLayer {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".to_string())
        .split(',')
        .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(false)
}
