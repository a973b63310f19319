//! Shared application state

use std::sync::Arc;

use crate::config::Config;
use crate::services::oracle_pool::OraclePool;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub oracle_pool: Arc<OraclePool>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let oracle_pool = OraclePool::provision(config.oracle_count, config.status_policy);
        Self {
            config: Arc::new(config),
            oracle_pool: Arc::new(oracle_pool),
        }
    }
}
