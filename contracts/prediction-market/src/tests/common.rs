//! Shared fixtures for the contract test suite.

use soroban_sdk::{
    testutils::{Address as _, Ledger as _},
    Address, BytesN, Env,
};

use super::mock_oracle::{MockOracle, MockOracleClient};
use crate::contract::{PredictionMarketContract, PredictionMarketContractClient};

pub const START_TIME: u64 = 1_700_000_000;
pub const WINDOW: u64 = 300;
pub const LOOKUP_FEE: i128 = 1000000;
pub const INITIAL_BALANCE: i128 = 1000_0000000;

pub fn feed(env: &Env, tag: u8) -> BytesN<32> {
    BytesN::from_array(env, &[tag; 32])
}

/// Registers the market contract and a mock oracle, initializes the market
/// contract against it, and returns the two clients plus the admin address.
pub fn setup<'a>(
    env: &'a Env,
) -> (
    PredictionMarketContractClient<'a>,
    MockOracleClient<'a>,
    Address,
) {
    env.ledger().with_mut(|li| {
        li.timestamp = START_TIME;
    });
    env.mock_all_auths();

    let contract_id = env.register(PredictionMarketContract, ());
    let client = PredictionMarketContractClient::new(env, &contract_id);

    let oracle_id = env.register(MockOracle, ());
    let oracle = MockOracleClient::new(env, &oracle_id);
    oracle.set_fee(&LOOKUP_FEE);

    let admin = Address::generate(env);
    client.initialize(&admin, &oracle_id);

    (client, oracle, admin)
}

/// Funds a fresh account from the faucet.
pub fn funded_user(env: &Env, client: &PredictionMarketContractClient<'_>) -> Address {
    let user = Address::generate(env);
    client.mint_initial(&user);
    user
}

pub fn advance_to(env: &Env, timestamp: u64) {
    env.ledger().with_mut(|li| {
        li.timestamp = timestamp;
    });
}

/// Registers a market on the given feed at the given oracle price and
/// returns the market id together with its (funded) creator.
pub fn open_market(
    env: &Env,
    client: &PredictionMarketContractClient<'_>,
    oracle: &MockOracleClient<'_>,
    tag: u8,
    price: i128,
) -> (BytesN<32>, Address) {
    let market = feed(env, tag);
    oracle.set_price(&market, &price);
    let creator = funded_user(env, client);
    client.initialize_market(&creator, &market, &LOOKUP_FEE);
    (market, creator)
}
