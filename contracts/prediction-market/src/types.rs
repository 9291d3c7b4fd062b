//! Type definitions for the price prediction market.

use soroban_sdk::{contracttype, Address, BytesN};

/// Storage keys for contract data
#[contracttype]
#[derive(Clone)]
pub enum DataKey {
    Balance(Address),
    Admin,
    Oracle,
    RoundWindowSecs,         // Round window D in seconds
    MarketIds,               // Vec<BytesN<32>>, insertion order
    Market(BytesN<32>),      // Market keyed by oracle feed id
    Round(BytesN<32>, u32),  // Round keyed by (market, round id)
    Position(BytesN<32>, u32, Address), // One position per (market, round, account)
    UserRounds(BytesN<32>, Address),    // Round ids the account participated in
    ProtocolFees,            // Accrued protocol fee balance
}

/// Represents which side a position is staked on
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub enum Side {
    Down,
    Up,
}

/// Winning side of a resolved round. `None` marks a tie price.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub enum WinningSide {
    None,
    Down,
    Up,
}

impl WinningSide {
    pub fn matches(&self, side: &Side) -> bool {
        matches!(
            (self, side),
            (WinningSide::Down, Side::Down) | (WinningSide::Up, Side::Up)
        )
    }
}

/// Lifecycle status of a round. A round id with no storage entry is `NotOpen`.
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub enum RoundStatus {
    NotOpen,
    Open,
    Live,
    Resolved,
    Refunding,
}

#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Market {
    pub oracle_feed_id: BytesN<32>,
    pub current_round_id: u32, // Monotonic, incremented on each round open
}

#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Round {
    pub lock_time: u64,      // No new positions after this timestamp
    pub closing_time: u64,   // Resolution permitted from this timestamp
    pub price_mark: i128,    // Strike price captured at lock time
    pub closing_price: i128, // Price captured at resolution
    pub total_shares: i128,
    pub bull_shares: i128,
    pub bear_shares: i128,
    pub reward_pool: i128,
    pub winning_shares: i128,
    pub status: RoundStatus,
    pub winning_side: WinningSide,
}

#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct Position {
    pub stake: i128, // Always > 0; stake and side are immutable after creation
    pub side: Side,
    pub settled: bool,
}

/// Position snapshot for account-scoped queries
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct PositionView {
    pub round_id: u32,
    pub stake: i128,
    pub side: Side,
    pub settled: bool,
}

/// Combined round + position snapshot for display
#[contracttype]
#[derive(Clone, Debug, PartialEq)]
pub struct RoundPositionView {
    pub round_id: u32,
    pub round: Round,
    pub position: Position,
}
