//! Flight Oracle Contract for FlightSurety
//!
//! This contract runs the oracle side of the insurance protocol: it registers
//! independent reporters and assigns each a fixed triple of routing indices,
//! dispatches flight-status requests to the oracles holding the canvassed
//! index, and tallies their responses until a status code reaches the
//! minimum-agreement threshold. The first quorum wins; everything submitted
//! afterwards is kept for audit but can no longer change the outcome. On
//! resolution the insurance fund contract is notified exactly once.

#![no_std]

#[cfg(test)]
extern crate std;

use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, token, xdr::ToXdr, Address,
    Bytes, BytesN, Env, IntoVal, Map, String, Symbol, Val, Vec,
};

/// Fee an oracle pays on registration. 1 unit of the pool token (7 decimals).
pub const REGISTRATION_FEE: i128 = 10_000_000;

/// Routing indices are drawn from `0..INDEX_RANGE`.
pub const INDEX_RANGE: u32 = 10;

/// Number of routing indices assigned to each oracle.
pub const INDEX_COUNT: u32 = 3;

/// Matching responses required for consensus unless overridden at
/// `initialize` or via `set_min_responses`.
pub const DEFAULT_MIN_RESPONSES: u32 = 3;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ContractError {
    Unauthorized = 1,
    AlreadyInitialized = 2,
    NotOperational = 3,
    InsufficientFee = 4,
    NotRegistered = 5,
    NotAuthorized = 6,
    UnknownRequest = 7,
    InvalidThreshold = 8,
}

/// Flight status codes reported by oracles. Only `LateAirline` makes the
/// insurance fund credit passengers.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlightStatus {
    Unknown = 0,
    OnTime = 10,
    LateAirline = 20,
    LateWeather = 30,
    LateTechnical = 40,
    LateOther = 50,
}

/// Identifies one flight and therefore one consensus round.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FlightKey {
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
}

/// Routing key handed back to the requester for correlation. Only oracles
/// holding `index` may answer.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StatusRequest {
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
    pub index: u32,
}

/// One submitted response, kept verbatim for audit.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResponseRecord {
    pub oracle: Address,
    pub status: FlightStatus,
}

/// Per-flight tally. `responses` maps a status code to the distinct oracle
/// addresses that reported it; `audit` records every submission, counted or
/// not. Once `resolved` flips, `outcome` never changes again.
#[contracttype]
#[derive(Clone, Debug)]
pub struct ResponseTally {
    pub index: u32,
    pub responses: Map<FlightStatus, Vec<Address>>,
    pub audit: Vec<ResponseRecord>,
    pub resolved: bool,
    pub outcome: FlightStatus,
}

#[contract]
pub struct FlightOracle;

#[contractimpl]
impl FlightOracle {
    /// Initialize with the admin, the fee token, the insurance fund that
    /// receives resolutions, and the consensus threshold.
    pub fn initialize(
        env: Env,
        admin: Address,
        token: Address,
        insurance_fund: Address,
        min_responses: u32,
    ) -> Result<(), ContractError> {
        if env.storage().instance().has(&symbol_short!("admin")) {
            return Err(ContractError::AlreadyInitialized);
        }
        if min_responses == 0 {
            return Err(ContractError::InvalidThreshold);
        }

        env.storage().instance().set(&symbol_short!("admin"), &admin);
        env.storage().instance().set(&symbol_short!("token"), &token);
        env.storage()
            .instance()
            .set(&symbol_short!("fund"), &insurance_fund);
        env.storage()
            .instance()
            .set(&symbol_short!("min_resp"), &min_responses);
        env.storage().instance().set(&symbol_short!("ops"), &true);
        env.storage()
            .instance()
            .set(&symbol_short!("orc_nonce"), &0u64);
        env.storage()
            .instance()
            .set(&symbol_short!("req_nonce"), &0u64);

        env.events()
            .publish((symbol_short!("orc_init"),), (admin, insurance_fund));

        Ok(())
    }

    /// Register the caller as an oracle and assign its routing indices.
    /// Registering an already registered address is idempotent and returns
    /// the stored triple without charging the fee again.
    pub fn register_oracle(
        env: Env,
        oracle: Address,
        fee: i128,
    ) -> Result<Vec<u32>, ContractError> {
        Self::require_operational(&env)?;
        oracle.require_auth();

        let oracle_key = (symbol_short!("oracle"), oracle.clone());
        if let Some(existing) = env.storage().persistent().get(&oracle_key) {
            return Ok(existing);
        }

        if fee < REGISTRATION_FEE {
            return Err(ContractError::InsufficientFee);
        }

        let token_addr: Address = env
            .storage()
            .instance()
            .get(&symbol_short!("token"))
            .ok_or(ContractError::Unauthorized)?;
        token::Client::new(&env, &token_addr).transfer(
            &oracle,
            &env.current_contract_address(),
            &fee,
        );

        let nonce = Self::bump_nonce(&env, symbol_short!("orc_nonce"));
        let indices = Self::derive_indices(&env, &oracle, nonce);
        env.storage().persistent().set(&oracle_key, &indices);

        // Index -> holders mapping, queried on each dispatch.
        for index in indices.iter() {
            let holders_key = (symbol_short!("holders"), index);
            let mut holders: Vec<Address> = env
                .storage()
                .persistent()
                .get(&holders_key)
                .unwrap_or(Vec::new(&env));
            holders.push_back(oracle.clone());
            env.storage().persistent().set(&holders_key, &holders);
        }

        env.events()
            .publish((symbol_short!("orc_reg"),), (oracle, indices.clone()));

        Ok(indices)
    }

    /// The stored index triple for an oracle.
    pub fn indices_of(env: Env, oracle: Address) -> Result<Vec<u32>, ContractError> {
        env.storage()
            .persistent()
            .get(&(symbol_short!("oracle"), oracle))
            .ok_or(ContractError::NotRegistered)
    }

    /// Every oracle holding a routing index, for dispatch fan-out.
    pub fn oracles_for_index(env: Env, index: u32) -> Vec<Address> {
        env.storage()
            .persistent()
            .get(&(symbol_short!("holders"), index))
            .unwrap_or(Vec::new(&env))
    }

    /// Open a consensus round for a flight and announce it to the oracles
    /// holding the canvassed index. Re-requesting an open round re-announces
    /// the same index; a resolved round is returned as-is.
    pub fn request_status(
        env: Env,
        requester: Address,
        airline: Address,
        flight: String,
        timestamp: u64,
    ) -> Result<StatusRequest, ContractError> {
        Self::require_operational(&env)?;
        requester.require_auth();

        let key = FlightKey {
            airline: airline.clone(),
            flight: flight.clone(),
            timestamp,
        };
        let tally_key = (symbol_short!("tally"), key.clone());

        if let Some(tally) = env
            .storage()
            .persistent()
            .get::<_, ResponseTally>(&tally_key)
        {
            if !tally.resolved {
                env.events().publish(
                    (symbol_short!("oreq"),),
                    (tally.index, airline.clone(), flight.clone(), timestamp),
                );
            }
            return Ok(StatusRequest {
                airline,
                flight,
                timestamp,
                index: tally.index,
            });
        }

        let nonce = Self::bump_nonce(&env, symbol_short!("req_nonce"));
        let index = Self::derive_indices(&env, &requester, nonce)
            .first()
            .unwrap_or(0);

        let tally = ResponseTally {
            index,
            responses: Map::new(&env),
            audit: Vec::new(&env),
            resolved: false,
            outcome: FlightStatus::Unknown,
        };
        env.storage().persistent().set(&tally_key, &tally);

        env.events().publish(
            (symbol_short!("oreq"),),
            (index, airline.clone(), flight.clone(), timestamp),
        );

        Ok(StatusRequest {
            airline,
            flight,
            timestamp,
            index,
        })
    }

    /// Record an oracle's response for an open round. Responses after
    /// resolution and duplicate (oracle, status) submissions are absorbed
    /// into the audit trail without erroring. Crossing the threshold
    /// resolves the round and notifies the insurance fund exactly once.
    pub fn submit_response(
        env: Env,
        oracle: Address,
        request: StatusRequest,
        status: FlightStatus,
    ) -> Result<(), ContractError> {
        Self::require_operational(&env)?;
        oracle.require_auth();

        let indices: Vec<u32> = env
            .storage()
            .persistent()
            .get(&(symbol_short!("oracle"), oracle.clone()))
            .ok_or(ContractError::NotAuthorized)?;
        if !indices.contains(request.index) {
            return Err(ContractError::NotAuthorized);
        }

        let key = FlightKey {
            airline: request.airline.clone(),
            flight: request.flight.clone(),
            timestamp: request.timestamp,
        };
        let tally_key = (symbol_short!("tally"), key.clone());
        let mut tally: ResponseTally = env
            .storage()
            .persistent()
            .get(&tally_key)
            .ok_or(ContractError::UnknownRequest)?;
        if tally.index != request.index {
            return Err(ContractError::UnknownRequest);
        }

        tally.audit.push_back(ResponseRecord {
            oracle: oracle.clone(),
            status,
        });

        if tally.resolved {
            env.storage().persistent().set(&tally_key, &tally);
            env.events()
                .publish((symbol_short!("oresp"),), (oracle, status, false));
            return Ok(());
        }

        let mut voters: Vec<Address> = tally
            .responses
            .get(status)
            .unwrap_or(Vec::new(&env));
        if voters.contains(&oracle) {
            env.storage().persistent().set(&tally_key, &tally);
            env.events()
                .publish((symbol_short!("oresp"),), (oracle, status, false));
            return Ok(());
        }
        voters.push_back(oracle.clone());
        tally.responses.set(status, voters.clone());

        let min_responses: u32 = env
            .storage()
            .instance()
            .get(&symbol_short!("min_resp"))
            .unwrap_or(DEFAULT_MIN_RESPONSES);

        if voters.len() >= min_responses {
            tally.resolved = true;
            tally.outcome = status;
        }
        // Persist the tally before any downstream call so a re-entrant
        // submission observes the resolved flag.
        env.storage().persistent().set(&tally_key, &tally);

        env.events()
            .publish((symbol_short!("oresp"),), (oracle, status, true));

        if tally.resolved {
            env.events().publish(
                (symbol_short!("resolved"),),
                (
                    key.airline.clone(),
                    key.flight.clone(),
                    key.timestamp,
                    status,
                ),
            );

            let fund: Address = env
                .storage()
                .instance()
                .get(&symbol_short!("fund"))
                .ok_or(ContractError::Unauthorized)?;
            let args: Vec<Val> =
                Vec::from_array(&env, [key.into_val(&env), status.into_val(&env)]);
            env.invoke_contract::<Val>(
                &fund,
                &Symbol::new(&env, "process_flight_status"),
                args,
            );
        }

        Ok(())
    }

    /// Change the consensus threshold (admin only).
    pub fn set_min_responses(env: Env, min_responses: u32) -> Result<(), ContractError> {
        let admin: Address = env
            .storage()
            .instance()
            .get(&symbol_short!("admin"))
            .ok_or(ContractError::Unauthorized)?;
        admin.require_auth();

        if min_responses == 0 {
            return Err(ContractError::InvalidThreshold);
        }
        env.storage()
            .instance()
            .set(&symbol_short!("min_resp"), &min_responses);

        Ok(())
    }

    /// Flip the operational gate (admin only).
    pub fn set_operational(env: Env, operational: bool) -> Result<(), ContractError> {
        let admin: Address = env
            .storage()
            .instance()
            .get(&symbol_short!("admin"))
            .ok_or(ContractError::Unauthorized)?;
        admin.require_auth();

        env.storage()
            .instance()
            .set(&symbol_short!("ops"), &operational);

        env.events()
            .publish((symbol_short!("ops_set"),), (operational,));

        Ok(())
    }

    // Reads

    pub fn is_operational(env: Env) -> bool {
        env.storage()
            .instance()
            .get(&symbol_short!("ops"))
            .unwrap_or(false)
    }

    pub fn min_responses(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&symbol_short!("min_resp"))
            .unwrap_or(DEFAULT_MIN_RESPONSES)
    }

    pub fn get_tally(
        env: Env,
        airline: Address,
        flight: String,
        timestamp: u64,
    ) -> Option<ResponseTally> {
        let key = FlightKey {
            airline,
            flight,
            timestamp,
        };
        env.storage()
            .persistent()
            .get(&(symbol_short!("tally"), key))
    }

    // Helpers

    fn require_operational(env: &Env) -> Result<(), ContractError> {
        let on: bool = env
            .storage()
            .instance()
            .get(&symbol_short!("ops"))
            .unwrap_or(false);
        if on {
            Ok(())
        } else {
            Err(ContractError::NotOperational)
        }
    }

    fn bump_nonce(env: &Env, key: Symbol) -> u64 {
        let nonce: u64 = env.storage().instance().get(&key).unwrap_or(0);
        env.storage().instance().set(&key, &(nonce + 1));
        nonce + 1
    }

    /// Derive `INDEX_COUNT` distinct routing indices from the address, a
    /// per-registration nonce and the current ledger. Deterministic given the
    /// seed, unpredictable to callers ahead of time.
    fn derive_indices(env: &Env, address: &Address, nonce: u64) -> Vec<u32> {
        let mut seed: Bytes = address.clone().to_xdr(env);
        seed.extend_from_slice(&nonce.to_be_bytes());
        seed.extend_from_slice(&env.ledger().sequence().to_be_bytes());
        seed.extend_from_slice(&env.ledger().timestamp().to_be_bytes());

        let digest: BytesN<32> = env.crypto().sha256(&seed).into();
        let digest = digest.to_array();

        let mut indices: Vec<u32> = Vec::new(env);
        for byte in digest.iter() {
            let index = (*byte as u32) % INDEX_RANGE;
            if !indices.contains(index) {
                indices.push_back(index);
                if indices.len() == INDEX_COUNT {
                    return indices;
                }
            }
        }
        // 32 digest bytes nearly always cover 3 distinct residues; walk the
        // range for the pathological remainder.
        let mut next = 0u32;
        while indices.len() < INDEX_COUNT {
            if !indices.contains(next) {
                indices.push_back(next);
            }
            next += 1;
        }
        indices
    }
}
