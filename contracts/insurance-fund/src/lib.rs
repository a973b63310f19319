//! Insurance Fund Contract for FlightSurety
//!
//! This contract keeps the passenger side of the protocol: insurance
//! purchases per flight, the credit ledger fed by oracle consensus
//! outcomes, and withdrawals. Resolutions are only accepted from the
//! authorized flight-oracle contract, and every purchase settles at most
//! once regardless of how often a resolution is re-delivered.

#![no_std]

#[cfg(test)]
extern crate std;

use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, token, Address, Env,
    String, Vec,
};

/// Highest premium a passenger may pay. 1 unit of the pool token
/// (7 decimals).
pub const MAX_PREMIUM: i128 = 10_000_000;

/// Credit applied on a qualifying outcome is premium * 3 / 2.
pub const PAYOUT_NUMERATOR: i128 = 3;
pub const PAYOUT_DENOMINATOR: i128 = 2;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ContractError {
    Unauthorized = 1,
    AlreadyInitialized = 2,
    NotOperational = 3,
    InvalidAmount = 4,
    PremiumTooHigh = 5,
    AlreadyPurchased = 6,
    NotAuthorized = 7,
    NoCredit = 8,
}

/// Local mirror of the flight-oracle FlightKey for cross-contract
/// deserialization. Field names and types must match the flight-oracle
/// definition exactly.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FlightKey {
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
}

/// Local mirror of the flight-oracle FlightStatus enumeration.
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

/// One passenger's insurance on one flight. `settled` flips exactly once,
/// when the first resolution for the flight arrives.
#[contracttype]
#[derive(Clone, Debug)]
pub struct Purchase {
    pub premium: i128,
    pub settled: bool,
    pub payout: i128,
}

#[contract]
pub struct InsuranceFund;

#[contractimpl]
impl InsuranceFund {
    /// Initialize with the admin and the token premiums and payouts move in.
    pub fn initialize(env: Env, admin: Address, token: Address) -> Result<(), ContractError> {
        if env.storage().instance().has(&symbol_short!("admin")) {
            return Err(ContractError::AlreadyInitialized);
        }

        env.storage().instance().set(&symbol_short!("admin"), &admin);
        env.storage().instance().set(&symbol_short!("token"), &token);
        env.storage().instance().set(&symbol_short!("ops"), &true);

        env.events().publish((symbol_short!("ins_init"),), (admin,));

        Ok(())
    }

    /// Register the contract allowed to deliver `process_flight_status`
    /// (admin only). In deployment this is the flight-oracle contract.
    pub fn authorize_caller(env: Env, caller: Address) -> Result<(), ContractError> {
        let admin: Address = env
            .storage()
            .instance()
            .get(&symbol_short!("admin"))
            .ok_or(ContractError::Unauthorized)?;
        admin.require_auth();

        env.storage().instance().set(&symbol_short!("app"), &caller);

        env.events()
            .publish((symbol_short!("auth_set"),), (caller,));

        Ok(())
    }

    /// Buy insurance on a flight. One purchase per passenger per flight.
    pub fn purchase(
        env: Env,
        passenger: Address,
        key: FlightKey,
        premium: i128,
    ) -> Result<(), ContractError> {
        Self::require_operational(&env)?;
        passenger.require_auth();

        if premium <= 0 {
            return Err(ContractError::InvalidAmount);
        }
        if premium > MAX_PREMIUM {
            return Err(ContractError::PremiumTooHigh);
        }

        let policy_key = (symbol_short!("policy"), key.clone(), passenger.clone());
        if env.storage().persistent().has(&policy_key) {
            return Err(ContractError::AlreadyPurchased);
        }

        let token_addr: Address = env
            .storage()
            .instance()
            .get(&symbol_short!("token"))
            .ok_or(ContractError::Unauthorized)?;
        token::Client::new(&env, &token_addr).transfer(
            &passenger,
            &env.current_contract_address(),
            &premium,
        );

        let purchase = Purchase {
            premium,
            settled: false,
            payout: 0,
        };
        env.storage().persistent().set(&policy_key, &purchase);

        let buyers_key = (symbol_short!("buyers"), key.clone());
        let mut buyers: Vec<Address> = env
            .storage()
            .persistent()
            .get(&buyers_key)
            .unwrap_or(Vec::new(&env));
        buyers.push_back(passenger.clone());
        env.storage().persistent().set(&buyers_key, &buyers);

        env.events().publish(
            (symbol_short!("ins_buy"),),
            (passenger, key.airline, key.flight, key.timestamp, premium),
        );

        Ok(())
    }

    /// Settle every purchase on a flight against the consensus outcome.
    /// Only the authorized caller may deliver this; re-delivery for an
    /// already settled flight is a no-op.
    pub fn process_flight_status(
        env: Env,
        key: FlightKey,
        status: FlightStatus,
    ) -> Result<(), ContractError> {
        Self::require_operational(&env)?;

        let app: Address = env
            .storage()
            .instance()
            .get(&symbol_short!("app"))
            .ok_or(ContractError::NotAuthorized)?;
        app.require_auth();

        let buyers: Vec<Address> = env
            .storage()
            .persistent()
            .get(&(symbol_short!("buyers"), key.clone()))
            .unwrap_or(Vec::new(&env));

        for passenger in buyers.iter() {
            let policy_key = (symbol_short!("policy"), key.clone(), passenger.clone());
            let mut purchase: Purchase = match env.storage().persistent().get(&policy_key) {
                Some(p) => p,
                None => continue,
            };
            if purchase.settled {
                continue;
            }
            purchase.settled = true;

            if status == FlightStatus::LateAirline {
                let payout = purchase
                    .premium
                    .checked_mul(PAYOUT_NUMERATOR)
                    .and_then(|v| v.checked_div(PAYOUT_DENOMINATOR))
                    .ok_or(ContractError::InvalidAmount)?;
                purchase.payout = payout;

                let credit_key = (symbol_short!("credit"), passenger.clone());
                let balance: i128 = env.storage().persistent().get(&credit_key).unwrap_or(0);
                let balance = balance
                    .checked_add(payout)
                    .ok_or(ContractError::InvalidAmount)?;
                env.storage().persistent().set(&credit_key, &balance);

                env.events().publish(
                    (symbol_short!("ins_cred"),),
                    (passenger.clone(), key.flight.clone(), payout, balance),
                );
            }

            env.storage().persistent().set(&policy_key, &purchase);
        }

        Ok(())
    }

    /// Move the passenger's whole credit balance out. The balance is zeroed
    /// before the token leaves the contract, so a re-entrant call finds
    /// nothing left to withdraw.
    pub fn withdraw(env: Env, passenger: Address) -> Result<i128, ContractError> {
        Self::require_operational(&env)?;
        passenger.require_auth();

        let credit_key = (symbol_short!("credit"), passenger.clone());
        let balance: i128 = env.storage().persistent().get(&credit_key).unwrap_or(0);
        if balance == 0 {
            return Err(ContractError::NoCredit);
        }

        env.storage().persistent().set(&credit_key, &0i128);

        let token_addr: Address = env
            .storage()
            .instance()
            .get(&symbol_short!("token"))
            .ok_or(ContractError::Unauthorized)?;
        token::Client::new(&env, &token_addr).transfer(
            &env.current_contract_address(),
            &passenger,
            &balance,
        );

        env.events()
            .publish((symbol_short!("ins_wdr"),), (passenger, balance));

        Ok(balance)
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

    pub fn credit_balance_of(env: Env, passenger: Address) -> i128 {
        env.storage()
            .persistent()
            .get(&(symbol_short!("credit"), passenger))
            .unwrap_or(0)
    }

    pub fn get_purchase(env: Env, key: FlightKey, passenger: Address) -> Option<Purchase> {
        env.storage()
            .persistent()
            .get(&(symbol_short!("policy"), key, passenger))
    }

    pub fn purchasers_of(env: Env, key: FlightKey) -> Vec<Address> {
        env.storage()
            .persistent()
            .get(&(symbol_short!("buyers"), key))
            .unwrap_or(Vec::new(&env))
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
}
