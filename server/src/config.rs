//! Environment-driven configuration for the FlightSurety server.

use crate::services::oracle_pool::StatusPolicy;

pub const DEFAULT_ORACLE_COUNT: usize = 20;
pub const DEFAULT_PORT: u16 = 3001;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub soroban_rpc_url: String,
    pub oracle_contract_id: Option<String>,
    pub oracle_count: usize,
    pub status_policy: StatusPolicy,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        let soroban_rpc_url = std::env::var("SOROBAN_RPC_URL")
            .unwrap_or_else(|_| "https://soroban-testnet.stellar.org".to_string());

        let oracle_contract_id = std::env::var("ORACLE_CONTRACT_ID")
            .ok()
            .filter(|id| !id.trim().is_empty());

        let oracle_count = std::env::var("ORACLE_COUNT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_ORACLE_COUNT);

        let status_policy = std::env::var("ORACLE_STATUS_MODE")
            .ok()
            .map(|v| parse_status_mode(&v))
            .unwrap_or(StatusPolicy::Fixed(20));

        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            soroban_rpc_url,
            oracle_contract_id,
            oracle_count,
            status_policy,
            port,
        }
    }
}

/// Accepts "random" or "fixed:<code>". Anything unparseable falls back to
/// the fixed late-airline code so local testing stays deterministic.
fn parse_status_mode(mode: &str) -> StatusPolicy {
    let mode = mode.trim().to_ascii_lowercase();
    if mode == "random" {
        return StatusPolicy::Random;
    }
    if let Some(code) = mode.strip_prefix("fixed:") {
        if let Ok(code) = code.parse::<u32>() {
            return StatusPolicy::Fixed(code);
        }
    }
    tracing::warn!(%mode, "unrecognized ORACLE_STATUS_MODE, using fixed:20");
    StatusPolicy::Fixed(20)
}
