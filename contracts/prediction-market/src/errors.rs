//! Error codes surfaced by the prediction market contract.

use soroban_sdk::contracterror;

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum ContractError {
    AlreadyInitialized = 1,
    AdminNotSet = 2,
    OracleNotSet = 3,
    MarketAlreadyExists = 4,
    MarketNotInitialized = 5,
    InvalidRoundStatus = 6,
    ActionTooEarly = 7,
    EntryClosed = 8,
    AmountCannotBeZero = 9,
    PositionExist = 10,
    PositionNotFound = 11,
    Claimed = 12,
    NoReward = 13,
    InsufficientFee = 14,
    InsufficientBalance = 15,
    UnsupportedFeed = 16,
    InvalidDuration = 17,
    Overflow = 18,
}
