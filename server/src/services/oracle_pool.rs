//! Simulated oracle pool
//!
//! Stands in for a fleet of independent oracle operators during
//! development: a set of oracles, each holding three distinct indices in
//! 0..10, answering canvass rounds according to a configurable policy.
//! The fixed late-airline policy keeps the payout path reproducible end
//! to end; the random policy exercises disagreement handling.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::{OracleResponse, SimulatedOracle, StatusRequest, ALL_STATUS_CODES};

pub const INDEX_RANGE: u8 = 10;
pub const INDEX_COUNT: usize = 3;

/// How a simulated oracle decides a flight's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    Fixed(u32),
    Random,
}

pub struct OraclePool {
    oracles: Vec<SimulatedOracle>,
    policy: StatusPolicy,
}

impl OraclePool {
    /// Provision `count` oracles with random index triples.
    pub fn provision(count: usize, policy: StatusPolicy) -> Self {
        let mut rng = rand::thread_rng();
        let oracles = (0..count)
            .map(|i| SimulatedOracle {
                address: format!("SIM-ORACLE-{:03}-{:08x}", i, rng.gen::<u32>()),
                indices: derive_indices(&mut rng),
            })
            .collect();

        Self { oracles, policy }
    }

    pub fn oracles(&self) -> &[SimulatedOracle] {
        &self.oracles
    }

    /// Oracles holding the canvassed index. Only these may answer.
    pub fn eligible(&self, index: u8) -> Vec<&SimulatedOracle> {
        self.oracles
            .iter()
            .filter(|oracle| oracle.indices.contains(&index))
            .collect()
    }

    /// Collect one answer per eligible oracle for an open round.
    pub fn respond(&self, request: &StatusRequest) -> Vec<OracleResponse> {
        self.eligible(request.index)
            .into_iter()
            .map(|oracle| OracleResponse {
                oracle: oracle.address.clone(),
                index: request.index,
                status_code: self.pick_status(),
            })
            .collect()
    }

    fn pick_status(&self) -> u32 {
        match self.policy {
            StatusPolicy::Fixed(code) => code,
            StatusPolicy::Random => *ALL_STATUS_CODES
                .choose(&mut rand::thread_rng())
                .unwrap_or(&0),
        }
    }
}

/// Three distinct indices in 0..INDEX_RANGE.
fn derive_indices<R: Rng>(rng: &mut R) -> [u8; INDEX_COUNT] {
    let mut indices = [0u8; INDEX_COUNT];
    let mut filled = 0;
    while filled < INDEX_COUNT {
        let candidate = rng.gen_range(0..INDEX_RANGE);
        if !indices[..filled].contains(&candidate) {
            indices[filled] = candidate;
            filled += 1;
        }
    }
    indices
}
