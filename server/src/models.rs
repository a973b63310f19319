//! Data models for the FlightSurety backend

use serde::{Deserialize, Serialize};

/// Flight status codes shared with the on-chain contracts.
pub const STATUS_CODE_UNKNOWN: u32 = 0;
pub const STATUS_CODE_ON_TIME: u32 = 10;
pub const STATUS_CODE_LATE_AIRLINE: u32 = 20;
pub const STATUS_CODE_LATE_WEATHER: u32 = 30;
pub const STATUS_CODE_LATE_TECHNICAL: u32 = 40;
pub const STATUS_CODE_LATE_OTHER: u32 = 50;

pub const ALL_STATUS_CODES: [u32; 6] = [
    STATUS_CODE_UNKNOWN,
    STATUS_CODE_ON_TIME,
    STATUS_CODE_LATE_AIRLINE,
    STATUS_CODE_LATE_WEATHER,
    STATUS_CODE_LATE_TECHNICAL,
    STATUS_CODE_LATE_OTHER,
];

pub fn is_known_status(code: u32) -> bool {
    ALL_STATUS_CODES.contains(&code)
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// One simulated oracle held by the server-side pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedOracle {
    pub address: String,
    pub indices: [u8; 3],
}

/// An open canvass round, as announced on-chain or posted to the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    pub index: u8,
    pub airline: String,
    pub flight: String,
    pub timestamp: u64,
}

/// One simulated oracle's answer to a canvass round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleResponse {
    pub oracle: String,
    pub index: u8,
    pub status_code: u32,
}
