//! Event listener for the flight-oracle contract
//!
//! Polls Soroban RPC for `oreq` events (a canvass round opening) and runs
//! the simulated oracle pool against each one, the way independent oracle
//! operators would watch the chain and submit their answers.

use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use stellar_xdr::curr::{Limits, ReadXdr, ScVal};

use crate::config::Config;
use crate::models::StatusRequest;
use crate::services::oracle_pool::{OraclePool, INDEX_RANGE};

/// Topic symbol the flight-oracle contract publishes for new rounds.
const REQUEST_TOPIC: &[u8] = b"oreq";

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("no oracle contract ID set in environment")]
    NoContractConfigured,
}

/// Soroban event as returned by the getEvents RPC method.
#[derive(Debug, Deserialize, Clone)]
pub struct SorobanEvent {
    pub topic: Vec<String>,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub ledger: u64,
}

#[derive(Debug, Deserialize)]
struct GetEventsResult {
    #[serde(default)]
    events: Vec<SorobanEvent>,
    #[serde(default, rename = "latestLedger")]
    latest_ledger: u64,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<GetEventsResult>,
}

pub struct EventListener {
    soroban_rpc_url: String,
    contract_id: Option<String>,
    oracle_pool: Arc<OraclePool>,
    last_ledger: u64,
    http_client: reqwest::Client,
}

impl EventListener {
    pub fn new(config: &Config, oracle_pool: Arc<OraclePool>) -> Self {
        Self {
            soroban_rpc_url: config.soroban_rpc_url.clone(),
            contract_id: config.oracle_contract_id.clone(),
            oracle_pool,
            last_ledger: 0,
            http_client: reqwest::Client::new(),
        }
    }

    /// Start polling. Returns immediately when no contract is configured so
    /// the supervisor can disable the listener instead of restarting it.
    pub async fn start(mut self) -> Result<(), StartError> {
        let contract_id = match self.contract_id.clone() {
            Some(id) => id,
            None => return Err(StartError::NoContractConfigured),
        };

        tracing::info!("Starting event listener for contract {}", contract_id);

        loop {
            if let Err(e) = self.poll_events(&contract_id).await {
                tracing::error!("Error polling events: {}", e);
            }

            // Poll every 5 seconds
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    }

    /// Poll Soroban RPC getEvents for new canvass rounds.
    async fn poll_events(&mut self, contract_id: &str) -> Result<()> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": "get_events",
            "method": "getEvents",
            "params": {
                "startLedger": self.last_ledger.to_string(),
                "filters": [{
                    "type": "contract",
                    "contractIds": [contract_id]
                }]
            }
        });

        let response = self
            .http_client
            .post(&self.soroban_rpc_url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!("Failed to poll events: HTTP {}", response.status());
            return Ok(());
        }

        let envelope: RpcEnvelope = response.json().await?;
        if let Some(result) = envelope.result {
            for event in &result.events {
                if event_is_status_request(event) {
                    match decode_status_request(&event.value) {
                        Some(request) => {
                            tracing::info!(
                                ledger = event.ledger,
                                flight = %request.flight,
                                index = request.index,
                                "canvass round opened on-chain"
                            );
                            self.simulate_round(&request).await;
                        }
                        None => {
                            tracing::warn!(
                                ledger = event.ledger,
                                "request event with undecodable value, skipping"
                            );
                        }
                    }
                }
            }
            if result.latest_ledger > self.last_ledger {
                self.last_ledger = result.latest_ledger;
            }
        }

        // Manual smoke-test path without a live chain.
        if std::env::var("SIMULATE_EVENTS").unwrap_or_default() == "true" {
            let request = StatusRequest {
                index: (self.last_ledger % INDEX_RANGE as u64) as u8,
                airline: "SIM-AIRLINE".to_string(),
                flight: "ND1309".to_string(),
                timestamp: chrono::Utc::now().timestamp() as u64,
            };
            self.simulate_round(&request).await;
            self.last_ledger = self.last_ledger.saturating_add(1);
        }

        Ok(())
    }

    /// Log each eligible oracle's answer for one round. Responses are
    /// simulated, not signed or submitted on-chain; transaction signing is
    /// out of scope for this server.
    async fn simulate_round(&self, request: &StatusRequest) {
        for response in self.oracle_pool.respond(request) {
            tracing::info!(
                oracle = %response.oracle,
                index = response.index,
                status = response.status_code,
                flight = %request.flight,
                "oracle response simulated"
            );
        }
    }
}

/// Decode a request event's value into the round it announces. The
/// flight-oracle contract publishes `(index, airline, flight, timestamp)`
/// as an ScVal vector; anything shaped differently is rejected.
pub fn decode_status_request(value_b64: &str) -> Option<StatusRequest> {
    let bytes = BASE64.decode(value_b64).ok()?;
    let value = ScVal::from_xdr(bytes, Limits::none()).ok()?;
    let ScVal::Vec(Some(fields)) = value else {
        return None;
    };
    let mut fields = fields.iter();

    let index = match fields.next()? {
        ScVal::U32(index) if *index < INDEX_RANGE as u32 => *index as u8,
        _ => return None,
    };
    let airline = match fields.next()? {
        ScVal::Address(address) => address.to_string(),
        _ => return None,
    };
    let flight = match fields.next()? {
        ScVal::String(flight) => flight.0.to_utf8_string_lossy(),
        _ => return None,
    };
    let timestamp = match fields.next()? {
        ScVal::U64(timestamp) => *timestamp,
        _ => return None,
    };

    Some(StatusRequest {
        index,
        airline,
        flight,
        timestamp,
    })
}

/// A round-opened event carries the `oreq` symbol in its first topic.
/// Topics arrive as base64-encoded XDR; a symbol's bytes appear verbatim
/// in the payload, so a substring check is enough to route on.
pub fn event_is_status_request(event: &SorobanEvent) -> bool {
    let Some(first) = event.topic.first() else {
        return false;
    };
    match BASE64.decode(first) {
        Ok(bytes) => bytes
            .windows(REQUEST_TOPIC.len())
            .any(|window| window == REQUEST_TOPIC),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stellar_xdr::curr::{
        AccountId, PublicKey, ScAddress, ScString, ScVec, Uint256, WriteXdr,
    };

    fn encode_value(value: &ScVal) -> String {
        BASE64.encode(value.to_xdr(Limits::none()).unwrap())
    }

    fn request_value(index: u32, flight: &str, timestamp: u64) -> String {
        let airline = ScAddress::Account(AccountId(PublicKey::PublicKeyTypeEd25519(Uint256(
            [7; 32],
        ))));
        let fields = vec![
            ScVal::U32(index),
            ScVal::Address(airline),
            ScVal::String(ScString(flight.try_into().unwrap())),
            ScVal::U64(timestamp),
        ];
        encode_value(&ScVal::Vec(Some(ScVec(fields.try_into().unwrap()))))
    }

    #[test]
    fn decodes_round_announcement() {
        let value = request_value(7, "ND1309", 1_700_000_000);
        let request = decode_status_request(&value).unwrap();
        assert_eq!(request.index, 7);
        assert_eq!(request.flight, "ND1309");
        assert_eq!(request.timestamp, 1_700_000_000);
        // Address renders as a strkey account ID.
        assert!(request.airline.starts_with('G'));
    }

    #[test]
    fn rejects_out_of_range_index() {
        let value = request_value(10, "ND1309", 1_700_000_000);
        assert!(decode_status_request(&value).is_none());
    }

    #[test]
    fn rejects_misshapen_values() {
        // Not a vector at all.
        assert!(decode_status_request(&encode_value(&ScVal::U32(3))).is_none());

        // Too few fields.
        let fields = vec![ScVal::U32(3)];
        let short = encode_value(&ScVal::Vec(Some(ScVec(fields.try_into().unwrap()))));
        assert!(decode_status_request(&short).is_none());

        // Not XDR.
        assert!(decode_status_request("@@not-base64@@").is_none());
        assert!(decode_status_request(&BASE64.encode(b"junk")).is_none());
    }

    fn event_with_topic(topic_bytes: &[u8]) -> SorobanEvent {
        SorobanEvent {
            topic: vec![BASE64.encode(topic_bytes)],
            value: String::new(),
            ledger: 100,
        }
    }

    #[test]
    fn recognizes_request_topic() {
        // XDR symbol framing around the name bytes.
        let mut framed = vec![0u8, 0, 0, 15, 0, 0, 0, 4];
        framed.extend_from_slice(b"oreq");
        assert!(event_is_status_request(&event_with_topic(&framed)));
    }

    #[test]
    fn ignores_other_topics() {
        let mut framed = vec![0u8, 0, 0, 15, 0, 0, 0, 7];
        framed.extend_from_slice(b"ins_buy");
        assert!(!event_is_status_request(&event_with_topic(&framed)));
    }

    #[test]
    fn ignores_malformed_topics() {
        let event = SorobanEvent {
            topic: vec!["not base64!!".to_string()],
            value: String::new(),
            ledger: 0,
        };
        assert!(!event_is_status_request(&event));

        let empty = SorobanEvent {
            topic: vec![],
            value: String::new(),
            ledger: 0,
        };
        assert!(!event_is_status_request(&empty));
    }
}
