//! Airline Registry Contract for FlightSurety
//!
//! This contract governs which airlines participate in the insurance pool.
//! The first airlines are admitted unconditionally; once the pool reaches
//! the bootstrap size, admission requires a majority vote among funded
//! airlines. Funding a minimum stake is the precondition for voting and
//! for sponsoring new members.

#![no_std]

#[cfg(test)]
extern crate std;

use soroban_sdk::{
    contract, contracterror, contractimpl, contracttype, symbol_short, token, Address, Env, Vec,
};

/// Minimum stake an airline must deposit before it may vote or sponsor
/// registrations. 10 units of the pool token (7 decimals).
pub const MIN_AIRLINE_FUNDING: i128 = 100_000_000;

/// Airlines up to this count register without a vote.
pub const BOOTSTRAP_AIRLINE_LIMIT: u32 = 4;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ContractError {
    Unauthorized = 1,
    AlreadyInitialized = 2,
    NotOperational = 3,
    NotRegistered = 4,
    BelowMinimum = 5,
    RequesterNotFunded = 6,
    AlreadyRegistered = 7,
    DuplicateVote = 8,
    InvalidAmount = 9,
}

/// Per-airline governance record. Presence in storage means the airline
/// is registered.
#[contracttype]
#[derive(Clone, Debug)]
pub struct Airline {
    pub funded: bool,
    pub contributed: i128,
    pub registered_at: u64,
}

#[contract]
pub struct AirlineRegistry;

#[contractimpl]
impl AirlineRegistry {
    /// Initialize the contract with the admin, the pool token and the first
    /// airline, which is registered unconditionally.
    pub fn initialize(
        env: Env,
        admin: Address,
        token: Address,
        first_airline: Address,
    ) -> Result<(), ContractError> {
        if env.storage().instance().has(&symbol_short!("admin")) {
            return Err(ContractError::AlreadyInitialized);
        }

        env.storage().instance().set(&symbol_short!("admin"), &admin);
        env.storage().instance().set(&symbol_short!("token"), &token);
        env.storage().instance().set(&symbol_short!("ops"), &true);
        env.storage().instance().set(&symbol_short!("air_cnt"), &0u32);
        env.storage().instance().set(&symbol_short!("fund_cnt"), &0u32);

        Self::admit(&env, &first_airline);

        env.events()
            .publish((symbol_short!("air_init"),), (admin, first_airline));

        Ok(())
    }

    /// Deposit stake for a registered airline. The funded flag flips once;
    /// further deposits only grow the recorded contribution.
    pub fn fund(env: Env, airline: Address, amount: i128) -> Result<(), ContractError> {
        Self::require_operational(&env)?;
        airline.require_auth();

        let key = (symbol_short!("airline"), airline.clone());
        let mut record: Airline = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(ContractError::NotRegistered)?;

        if amount < MIN_AIRLINE_FUNDING {
            return Err(ContractError::BelowMinimum);
        }

        let token_addr: Address = env
            .storage()
            .instance()
            .get(&symbol_short!("token"))
            .ok_or(ContractError::Unauthorized)?;
        let token_client = token::Client::new(&env, &token_addr);
        token_client.transfer(&airline, &env.current_contract_address(), &amount);

        record.contributed = record
            .contributed
            .checked_add(amount)
            .ok_or(ContractError::InvalidAmount)?;
        if !record.funded {
            record.funded = true;
            let funded: u32 = env
                .storage()
                .instance()
                .get(&symbol_short!("fund_cnt"))
                .unwrap_or(0);
            env.storage()
                .instance()
                .set(&symbol_short!("fund_cnt"), &(funded + 1));
        }
        env.storage().persistent().set(&key, &record);

        env.events().publish(
            (symbol_short!("air_fund"),),
            (airline, amount, record.contributed),
        );

        Ok(())
    }

    /// Register a new airline, or cast a vote for it once the pool exceeds
    /// the bootstrap size. Returns whether the candidate is registered after
    /// this call.
    pub fn register_airline(
        env: Env,
        requester: Address,
        candidate: Address,
    ) -> Result<bool, ContractError> {
        Self::require_operational(&env)?;
        requester.require_auth();

        let sponsor: Airline = env
            .storage()
            .persistent()
            .get(&(symbol_short!("airline"), requester.clone()))
            .ok_or(ContractError::RequesterNotFunded)?;
        if !sponsor.funded {
            return Err(ContractError::RequesterNotFunded);
        }

        if env
            .storage()
            .persistent()
            .has(&(symbol_short!("airline"), candidate.clone()))
        {
            return Err(ContractError::AlreadyRegistered);
        }

        let registered: u32 = env
            .storage()
            .instance()
            .get(&symbol_short!("air_cnt"))
            .unwrap_or(0);

        if registered < BOOTSTRAP_AIRLINE_LIMIT {
            Self::admit(&env, &candidate);
            return Ok(true);
        }

        let votes_key = (symbol_short!("votes"), candidate.clone());
        let mut votes: Vec<Address> = env
            .storage()
            .persistent()
            .get(&votes_key)
            .unwrap_or(Vec::new(&env));

        if votes.contains(&requester) {
            return Err(ContractError::DuplicateVote);
        }
        votes.push_back(requester);

        let funded: u32 = env
            .storage()
            .instance()
            .get(&symbol_short!("fund_cnt"))
            .unwrap_or(0);
        let threshold = (funded + 1) / 2;

        if votes.len() >= threshold {
            env.storage().persistent().remove(&votes_key);
            Self::admit(&env, &candidate);
            Ok(true)
        } else {
            env.storage().persistent().set(&votes_key, &votes);
            env.events().publish(
                (symbol_short!("air_vote"),),
                (candidate, votes.len(), threshold),
            );
            Ok(false)
        }
    }

    /// Flip the operational gate (admin only). While off, every mutating
    /// entry point fails with `NotOperational`; reads stay available.
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

    pub fn is_registered(env: Env, airline: Address) -> bool {
        env.storage()
            .persistent()
            .has(&(symbol_short!("airline"), airline))
    }

    pub fn is_funded(env: Env, airline: Address) -> bool {
        env.storage()
            .persistent()
            .get(&(symbol_short!("airline"), airline))
            .map(|a: Airline| a.funded)
            .unwrap_or(false)
    }

    pub fn airline_count(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&symbol_short!("air_cnt"))
            .unwrap_or(0)
    }

    pub fn funded_count(env: Env) -> u32 {
        env.storage()
            .instance()
            .get(&symbol_short!("fund_cnt"))
            .unwrap_or(0)
    }

    pub fn votes_of(env: Env, candidate: Address) -> u32 {
        env.storage()
            .persistent()
            .get(&(symbol_short!("votes"), candidate))
            .map(|v: Vec<Address>| v.len())
            .unwrap_or(0)
    }

    pub fn contribution_of(env: Env, airline: Address) -> i128 {
        env.storage()
            .persistent()
            .get(&(symbol_short!("airline"), airline))
            .map(|a: Airline| a.contributed)
            .unwrap_or(0)
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

    fn admit(env: &Env, airline: &Address) {
        let record = Airline {
            funded: false,
            contributed: 0,
            registered_at: env.ledger().timestamp(),
        };
        env.storage()
            .persistent()
            .set(&(symbol_short!("airline"), airline.clone()), &record);

        let count: u32 = env
            .storage()
            .instance()
            .get(&symbol_short!("air_cnt"))
            .unwrap_or(0);
        env.storage()
            .instance()
            .set(&symbol_short!("air_cnt"), &(count + 1));

        env.events()
            .publish((symbol_short!("air_reg"),), (airline.clone(), count + 1));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;
    use soroban_sdk::{testutils::Address as _, token, Address, Env};

    struct TestCtx {
        env: Env,
        registry: Address,
        token: Address,
        first_airline: Address,
        admin: Address,
    }

    fn setup() -> TestCtx {
        let env = Env::default();
        env.mock_all_auths();

        let admin = Address::generate(&env);
        let first_airline = Address::generate(&env);

        let registry = env.register(AirlineRegistry, ());

        let token_admin = Address::generate(&env);
        let token_contract = env.register_stellar_asset_contract_v2(token_admin);
        let token = token_contract.address();

        let client = AirlineRegistryClient::new(&env, &registry);
        client.initialize(&admin, &token, &first_airline);

        TestCtx {
            env,
            registry,
            token,
            first_airline,
            admin,
        }
    }

    fn mint(t: &TestCtx, to: &Address, amount: i128) {
        let token_admin_client = token::StellarAssetClient::new(&t.env, &t.token);
        token_admin_client.mint(to, &amount);
    }

    /// Register and fund a fresh airline, sponsored by `sponsor`.
    fn add_funded_airline(t: &TestCtx, sponsor: &Address) -> Address {
        let client = AirlineRegistryClient::new(&t.env, &t.registry);
        let airline = Address::generate(&t.env);
        assert!(client.register_airline(sponsor, &airline));
        mint(t, &airline, MIN_AIRLINE_FUNDING);
        client.fund(&airline, &MIN_AIRLINE_FUNDING);
        airline
    }

    #[test]
    fn test_initialize_registers_first_airline() {
        let t = setup();
        let client = AirlineRegistryClient::new(&t.env, &t.registry);

        assert!(client.is_registered(&t.first_airline));
        assert!(!client.is_funded(&t.first_airline));
        assert_eq!(client.airline_count(), 1);
        assert!(client.is_operational());
    }

    #[test]
    #[should_panic(expected = "HostError: Error(Contract, #2)")]
    fn test_initialize_already_initialized() {
        let t = setup();
        let client = AirlineRegistryClient::new(&t.env, &t.registry);
        client.initialize(&t.admin, &t.token, &t.first_airline);
    }

    #[test]
    fn test_fund_below_minimum_rejected() {
        let t = setup();
        let client = AirlineRegistryClient::new(&t.env, &t.registry);

        mint(&t, &t.first_airline, MIN_AIRLINE_FUNDING);
        let result = client.try_fund(&t.first_airline, &(MIN_AIRLINE_FUNDING - 1));
        assert_eq!(result, Err(Ok(ContractError::BelowMinimum)));

        assert!(!client.is_funded(&t.first_airline));
        // No tokens moved
        let token_client = token::Client::new(&t.env, &t.token);
        assert_eq!(token_client.balance(&t.first_airline), MIN_AIRLINE_FUNDING);
    }

    #[test]
    #[should_panic(expected = "HostError: Error(Contract, #4)")]
    fn test_fund_unregistered_airline() {
        let t = setup();
        let client = AirlineRegistryClient::new(&t.env, &t.registry);

        let outsider = Address::generate(&t.env);
        mint(&t, &outsider, MIN_AIRLINE_FUNDING);
        client.fund(&outsider, &MIN_AIRLINE_FUNDING);
    }

    #[test]
    fn test_fund_success_and_repeat_funding() {
        let t = setup();
        let client = AirlineRegistryClient::new(&t.env, &t.registry);

        mint(&t, &t.first_airline, 3 * MIN_AIRLINE_FUNDING);
        client.fund(&t.first_airline, &MIN_AIRLINE_FUNDING);

        assert!(client.is_funded(&t.first_airline));
        assert_eq!(client.funded_count(), 1);
        assert_eq!(client.contribution_of(&t.first_airline), MIN_AIRLINE_FUNDING);

        let token_client = token::Client::new(&t.env, &t.token);
        assert_eq!(token_client.balance(&t.registry), MIN_AIRLINE_FUNDING);

        // Repeat funding accumulates but does not double count the airline
        client.fund(&t.first_airline, &(2 * MIN_AIRLINE_FUNDING));
        assert!(client.is_funded(&t.first_airline));
        assert_eq!(client.funded_count(), 1);
        assert_eq!(
            client.contribution_of(&t.first_airline),
            3 * MIN_AIRLINE_FUNDING
        );
    }

    #[test]
    fn test_register_requires_funded_sponsor() {
        let t = setup();
        let client = AirlineRegistryClient::new(&t.env, &t.registry);

        let candidate = Address::generate(&t.env);
        let result = client.try_register_airline(&t.first_airline, &candidate);
        assert_eq!(result, Err(Ok(ContractError::RequesterNotFunded)));
        assert!(!client.is_registered(&candidate));

        // Unregistered sponsors are rejected the same way
        let stranger = Address::generate(&t.env);
        let result = client.try_register_airline(&stranger, &candidate);
        assert_eq!(result, Err(Ok(ContractError::RequesterNotFunded)));
    }

    #[test]
    fn test_bootstrap_airlines_register_without_vote() {
        let t = setup();
        let client = AirlineRegistryClient::new(&t.env, &t.registry);

        mint(&t, &t.first_airline, MIN_AIRLINE_FUNDING);
        client.fund(&t.first_airline, &MIN_AIRLINE_FUNDING);

        for expected in 2..=BOOTSTRAP_AIRLINE_LIMIT {
            let airline = Address::generate(&t.env);
            assert!(client.register_airline(&t.first_airline, &airline));
            assert!(client.is_registered(&airline));
            assert_eq!(client.airline_count(), expected);
        }
    }

    #[test]
    #[should_panic(expected = "HostError: Error(Contract, #7)")]
    fn test_register_already_registered() {
        let t = setup();
        let client = AirlineRegistryClient::new(&t.env, &t.registry);

        mint(&t, &t.first_airline, MIN_AIRLINE_FUNDING);
        client.fund(&t.first_airline, &MIN_AIRLINE_FUNDING);
        client.register_airline(&t.first_airline, &t.first_airline);
    }

    #[test]
    fn test_fifth_airline_requires_majority() {
        let t = setup();
        let client = AirlineRegistryClient::new(&t.env, &t.registry);

        mint(&t, &t.first_airline, MIN_AIRLINE_FUNDING);
        client.fund(&t.first_airline, &MIN_AIRLINE_FUNDING);

        // Fill the bootstrap pool: 4 registered, all funded.
        let second = add_funded_airline(&t, &t.first_airline);
        let third = add_funded_airline(&t, &t.first_airline);
        let _fourth = add_funded_airline(&t, &t.first_airline);
        assert_eq!(client.airline_count(), 4);
        assert_eq!(client.funded_count(), 4);

        // 4 funded airlines -> threshold is 2 votes.
        let fifth = Address::generate(&t.env);
        assert!(!client.register_airline(&t.first_airline, &fifth));
        assert!(!client.is_registered(&fifth));
        assert_eq!(client.votes_of(&fifth), 1);

        // Same sponsor cannot vote twice.
        let result = client.try_register_airline(&t.first_airline, &fifth);
        assert_eq!(result, Err(Ok(ContractError::DuplicateVote)));
        assert_eq!(client.votes_of(&fifth), 1);

        // A second funded voter crosses the threshold.
        assert!(client.register_airline(&second, &fifth));
        assert!(client.is_registered(&fifth));
        assert_eq!(client.airline_count(), 5);

        // Vote record is cleared once the candidate is in.
        assert_eq!(client.votes_of(&fifth), 0);

        // Voting again for a registered airline is an error, not a vote.
        let result = client.try_register_airline(&third, &fifth);
        assert_eq!(result, Err(Ok(ContractError::AlreadyRegistered)));
    }

    #[test]
    fn test_operational_gate_blocks_mutations() {
        let t = setup();
        let client = AirlineRegistryClient::new(&t.env, &t.registry);

        mint(&t, &t.first_airline, 2 * MIN_AIRLINE_FUNDING);
        client.fund(&t.first_airline, &MIN_AIRLINE_FUNDING);

        client.set_operational(&false);
        assert!(!client.is_operational());

        let candidate = Address::generate(&t.env);
        let result = client.try_register_airline(&t.first_airline, &candidate);
        assert_eq!(result, Err(Ok(ContractError::NotOperational)));
        let result = client.try_fund(&t.first_airline, &MIN_AIRLINE_FUNDING);
        assert_eq!(result, Err(Ok(ContractError::NotOperational)));

        // Reads stay available and state is unchanged.
        assert_eq!(client.airline_count(), 1);
        assert!(client.is_funded(&t.first_airline));
        assert!(!client.is_registered(&candidate));

        // Back on, everything works again.
        client.set_operational(&true);
        assert!(client.register_airline(&t.first_airline, &candidate));
    }

    #[test]
    #[should_panic]
    fn test_set_operational_requires_admin_auth() {
        let env = Env::default();

        let admin = Address::generate(&env);
        let first_airline = Address::generate(&env);
        let token_admin = Address::generate(&env);
        let token = env.register_stellar_asset_contract_v2(token_admin).address();

        let registry = env.register(AirlineRegistry, ());
        let client = AirlineRegistryClient::new(&env, &registry);

        client.initialize(&admin, &token, &first_airline);

        // No auth mocked for this call; must panic.
        client.set_operational(&false);
    }

    proptest! {
        #[test]
        fn prop_funding_floor(amount in 1i128..MIN_AIRLINE_FUNDING) {
            let t = setup();
            let client = AirlineRegistryClient::new(&t.env, &t.registry);

            mint(&t, &t.first_airline, amount);
            let result = client.try_fund(&t.first_airline, &amount);
            prop_assert_eq!(result, Err(Ok(ContractError::BelowMinimum)));
            prop_assert!(!client.is_funded(&t.first_airline));
        }

        #[test]
        fn prop_funding_at_or_above_floor(
            amount in MIN_AIRLINE_FUNDING..MIN_AIRLINE_FUNDING * 100
        ) {
            let t = setup();
            let client = AirlineRegistryClient::new(&t.env, &t.registry);

            mint(&t, &t.first_airline, amount);
            client.fund(&t.first_airline, &amount);
            prop_assert!(client.is_funded(&t.first_airline));
            prop_assert_eq!(client.contribution_of(&t.first_airline), amount);
        }
    }
}
