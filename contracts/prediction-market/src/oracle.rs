//! Client interface for the external price oracle contract.

use soroban_sdk::{contractclient, contracttype, BytesN, Env};

/// Price report returned by the oracle for a feed.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct PriceData {
    pub price: i128,
    pub decimals: u32,
    pub timestamp: u64,
}

/// Interface of the price oracle this market consults. The oracle charges a
/// per-lookup fee and may not serve every feed id.
#[contractclient(name = "PriceOracleClient")]
pub trait PriceOracle {
    /// Fee required for a single price lookup.
    fn lookup_fee(env: Env) -> i128;

    /// Latest price for the feed, or `None` if the feed is unsupported.
    fn lastprice(env: Env, feed_id: BytesN<32>) -> Option<PriceData>;
}
