//! Core contract implementation for the peer-to-pool price prediction market.
//!
//! Each market is keyed by an oracle feed id and runs a self-chaining
//! sequence of rounds: resolving a live round locks the next one at the
//! freshly fetched price and opens a new round behind it, so one live and
//! one open round coexist at all times without an external scheduler.

use soroban_sdk::{contract, contractimpl, symbol_short, Address, BytesN, Env, Vec};

use crate::errors::ContractError;
use crate::oracle::PriceOracleClient;
use crate::types::{
    DataKey, Market, Position, PositionView, Round, RoundPositionView, RoundStatus, Side,
    WinningSide,
};

/// Default round window D in seconds. Lock and closing times derive from it.
const DEFAULT_ROUND_WINDOW_SECS: u64 = 300;

/// Protocol fee in basis points over 10_000 (10% of the losing pool).
const FEE_BPS: i128 = 1000;
const BPS_DENOMINATOR: i128 = 10_000;

/// Default number of entries returned by `get_latest_rounds_with_position`.
const DEFAULT_POSITION_QUERY_LIMIT: u32 = 5;

#[contract]
pub struct PredictionMarketContract;

#[contractimpl]
impl PredictionMarketContract {
    /// Initializes the contract with admin and oracle contract addresses (one-time only)
    pub fn initialize(env: Env, admin: Address, oracle: Address) -> Result<(), ContractError> {
        admin.require_auth();

        if env.storage().persistent().has(&DataKey::Admin) {
            return Err(ContractError::AlreadyInitialized);
        }

        env.storage().persistent().set(&DataKey::Admin, &admin);
        env.storage().persistent().set(&DataKey::Oracle, &oracle);
        env.storage()
            .persistent()
            .set(&DataKey::RoundWindowSecs, &DEFAULT_ROUND_WINDOW_SECS);

        Ok(())
    }

    /// Sets the round window (admin only). Applies to rounds scheduled from
    /// now on; already scheduled rounds keep their timestamps.
    pub fn set_round_window(env: Env, window_secs: u64) -> Result<(), ContractError> {
        let admin: Address = env
            .storage()
            .persistent()
            .get(&DataKey::Admin)
            .ok_or(ContractError::AdminNotSet)?;

        admin.require_auth();

        if window_secs == 0 {
            return Err(ContractError::InvalidDuration);
        }

        env.storage()
            .persistent()
            .set(&DataKey::RoundWindowSecs, &window_secs);

        #[allow(deprecated)]
        env.events().publish(
            (symbol_short!("window"), symbol_short!("updated")),
            window_secs,
        );

        Ok(())
    }

    /// Registers a market for an oracle feed and bootstraps its rounds:
    /// round 1 is opened and immediately locked at the current price, round 2
    /// is opened for entries.
    pub fn initialize_market(
        env: Env,
        creator: Address,
        feed_id: BytesN<32>,
        attached_fee: i128,
    ) -> Result<(), ContractError> {
        creator.require_auth();

        let oracle_addr: Address = env
            .storage()
            .persistent()
            .get(&DataKey::Oracle)
            .ok_or(ContractError::OracleNotSet)?;

        if env
            .storage()
            .persistent()
            .has(&DataKey::Market(feed_id.clone()))
        {
            return Err(ContractError::MarketAlreadyExists);
        }

        let oracle = PriceOracleClient::new(&env, &oracle_addr);
        if attached_fee < oracle.lookup_fee() {
            return Err(ContractError::InsufficientFee);
        }
        Self::_debit(&env, creator.clone(), attached_fee)?;
        Self::_credit(&env, oracle_addr, attached_fee)?;

        let price = oracle
            .lastprice(&feed_id)
            .ok_or(ContractError::UnsupportedFeed)?;

        let mut market = Market {
            oracle_feed_id: feed_id.clone(),
            current_round_id: 0,
        };

        let first = Self::_open_round(&env, &feed_id, &mut market)?;
        Self::_lock_round(&env, &feed_id, first, price.price)?;
        Self::_open_round(&env, &feed_id, &mut market)?;

        env.storage()
            .persistent()
            .set(&DataKey::Market(feed_id.clone()), &market);

        let mut ids: Vec<BytesN<32>> = env
            .storage()
            .persistent()
            .get(&DataKey::MarketIds)
            .unwrap_or(Vec::new(&env));
        ids.push_back(feed_id.clone());
        env.storage().persistent().set(&DataKey::MarketIds, &ids);

        #[allow(deprecated)]
        env.events().publish(
            (symbol_short!("market"), symbol_short!("init")),
            (feed_id, creator),
        );

        Ok(())
    }

    /// Opens a down position on a round of the market.
    pub fn bearish(
        env: Env,
        account: Address,
        market_id: BytesN<32>,
        round_id: u32,
        amount: i128,
    ) -> Result<(), ContractError> {
        Self::_predict(env, account, market_id, round_id, amount, Side::Down)
    }

    /// Opens an up position on a round of the market.
    pub fn bullish(
        env: Env,
        account: Address,
        market_id: BytesN<32>,
        round_id: u32,
        amount: i128,
    ) -> Result<(), ContractError> {
        Self::_predict(env, account, market_id, round_id, amount, Side::Up)
    }

    /// Resolves a live round once its closing time has passed. Callable by
    /// anyone; the caller pays the oracle fee and earns the resolver
    /// incentive for performing the maintenance call.
    pub fn resolve(
        env: Env,
        resolver: Address,
        market_id: BytesN<32>,
        round_id: u32,
        attached_fee: i128,
    ) -> Result<(), ContractError> {
        resolver.require_auth();

        let mut market: Market = env
            .storage()
            .persistent()
            .get(&DataKey::Market(market_id.clone()))
            .ok_or(ContractError::MarketNotInitialized)?;

        let round: Round = env
            .storage()
            .persistent()
            .get(&DataKey::Round(market_id.clone(), round_id))
            .ok_or(ContractError::InvalidRoundStatus)?;

        if round.status != RoundStatus::Live {
            return Err(ContractError::InvalidRoundStatus);
        }

        if env.ledger().timestamp() < round.closing_time {
            return Err(ContractError::ActionTooEarly);
        }

        let oracle_addr: Address = env
            .storage()
            .persistent()
            .get(&DataKey::Oracle)
            .ok_or(ContractError::OracleNotSet)?;
        let oracle = PriceOracleClient::new(&env, &oracle_addr);
        if attached_fee < oracle.lookup_fee() {
            return Err(ContractError::InsufficientFee);
        }
        Self::_debit(&env, resolver.clone(), attached_fee)?;
        Self::_credit(&env, oracle_addr, attached_fee)?;

        let price = oracle
            .lastprice(&market.oracle_feed_id)
            .ok_or(ContractError::UnsupportedFeed)?;

        // Chain the lifecycle: the fetched price locks the next round, and a
        // fresh round opens behind it.
        let next = round_id.checked_add(1).ok_or(ContractError::Overflow)?;
        Self::_lock_round(&env, &market_id, next, price.price)?;
        Self::_open_round(&env, &market_id, &mut market)?;
        env.storage()
            .persistent()
            .set(&DataKey::Market(market_id.clone()), &market);

        let resolver_reward =
            Self::_finalize_round(&env, &market_id, round_id, round, price.price)?;

        // Paid last, after all round state is written.
        if resolver_reward > 0 {
            Self::_credit(&env, resolver, resolver_reward)?;
        }

        Ok(())
    }

    /// Batch-claims rewards and refunds for the caller's positions. Any
    /// failing round id aborts the whole batch; rewards are credited in a
    /// single transfer at the end.
    pub fn settle(
        env: Env,
        account: Address,
        market_id: BytesN<32>,
        round_ids: Vec<u32>,
    ) -> Result<i128, ContractError> {
        account.require_auth();

        let mut total_reward: i128 = 0;

        for round_id in round_ids.iter() {
            let position_key = DataKey::Position(market_id.clone(), round_id, account.clone());
            let mut position: Position = env
                .storage()
                .persistent()
                .get(&position_key)
                .ok_or(ContractError::PositionNotFound)?;

            if position.settled {
                return Err(ContractError::Claimed);
            }

            // Settled flips before any value computation or transfer.
            position.settled = true;
            env.storage().persistent().set(&position_key, &position);

            let round: Round = env
                .storage()
                .persistent()
                .get(&DataKey::Round(market_id.clone(), round_id))
                .ok_or(ContractError::NoReward)?;

            let reward = match round.status {
                RoundStatus::Resolved => {
                    if round.winning_side.matches(&position.side) {
                        // winning_shares includes this stake, so it is nonzero.
                        position
                            .stake
                            .checked_mul(round.reward_pool)
                            .ok_or(ContractError::Overflow)?
                            / round.winning_shares
                    } else {
                        return Err(ContractError::NoReward);
                    }
                }
                RoundStatus::Refunding => position.stake,
                _ => return Err(ContractError::NoReward),
            };

            total_reward = total_reward
                .checked_add(reward)
                .ok_or(ContractError::Overflow)?;

            #[allow(deprecated)]
            env.events().publish(
                (symbol_short!("reward"), symbol_short!("claimed")),
                (market_id.clone(), round_id, account.clone(), reward),
            );
        }

        if total_reward > 0 {
            Self::_credit(&env, account, total_reward)?;
        }

        Ok(total_reward)
    }

    /// Moves the accrued protocol fee balance to the admin (admin only).
    pub fn claim_protocol_fees(env: Env) -> Result<i128, ContractError> {
        let admin: Address = env
            .storage()
            .persistent()
            .get(&DataKey::Admin)
            .ok_or(ContractError::AdminNotSet)?;

        admin.require_auth();

        let amount: i128 = env
            .storage()
            .persistent()
            .get(&DataKey::ProtocolFees)
            .unwrap_or(0);
        if amount > 0 {
            env.storage().persistent().set(&DataKey::ProtocolFees, &0i128);
            Self::_credit(&env, admin.clone(), amount)?;
        }

        #[allow(deprecated)]
        env.events().publish(
            (symbol_short!("fees"), symbol_short!("claimed")),
            (admin, amount),
        );

        Ok(amount)
    }

    /// Returns all registered market identifiers, insertion order.
    pub fn get_market_ids(env: Env) -> Vec<BytesN<32>> {
        env.storage()
            .persistent()
            .get(&DataKey::MarketIds)
            .unwrap_or(Vec::new(&env))
    }

    pub fn get_market(env: Env, market_id: BytesN<32>) -> Option<Market> {
        env.storage().persistent().get(&DataKey::Market(market_id))
    }

    pub fn get_round(env: Env, market_id: BytesN<32>, round_id: u32) -> Option<Round> {
        env.storage()
            .persistent()
            .get(&DataKey::Round(market_id, round_id))
    }

    pub fn get_position(
        env: Env,
        market_id: BytesN<32>,
        round_id: u32,
        account: Address,
    ) -> Option<Position> {
        env.storage()
            .persistent()
            .get(&DataKey::Position(market_id, round_id, account))
    }

    /// Returns the round ids the account has entered in the market.
    pub fn get_my_round_ids(env: Env, market_id: BytesN<32>, account: Address) -> Vec<u32> {
        env.storage()
            .persistent()
            .get(&DataKey::UserRounds(market_id, account))
            .unwrap_or(Vec::new(&env))
    }

    /// Returns the account's positions in the market, oldest first.
    pub fn get_positions(env: Env, market_id: BytesN<32>, account: Address) -> Vec<PositionView> {
        let round_ids = Self::get_my_round_ids(env.clone(), market_id.clone(), account.clone());
        let mut views = Vec::new(&env);
        for i in 0..round_ids.len() {
            if let Some(round_id) = round_ids.get(i) {
                let position: Option<Position> = env.storage().persistent().get(
                    &DataKey::Position(market_id.clone(), round_id, account.clone()),
                );
                if let Some(position) = position {
                    views.push_back(PositionView {
                        round_id,
                        stake: position.stake,
                        side: position.side,
                        settled: position.settled,
                    });
                }
            }
        }
        views
    }

    /// Returns the account's latest round/position snapshots, newest first.
    /// `count` defaults to 5 and clamps to the rounds entered so far.
    pub fn get_latest_rounds_with_position(
        env: Env,
        market_id: BytesN<32>,
        account: Address,
        count: Option<u32>,
    ) -> Vec<RoundPositionView> {
        let round_ids = Self::get_my_round_ids(env.clone(), market_id.clone(), account.clone());
        let wanted = count.unwrap_or(DEFAULT_POSITION_QUERY_LIMIT);

        let mut views = Vec::new(&env);
        let mut i = round_ids.len();
        while i > 0 && views.len() < wanted {
            i -= 1;
            if let Some(round_id) = round_ids.get(i) {
                let round: Option<Round> = env
                    .storage()
                    .persistent()
                    .get(&DataKey::Round(market_id.clone(), round_id));
                let position: Option<Position> = env.storage().persistent().get(
                    &DataKey::Position(market_id.clone(), round_id, account.clone()),
                );
                if let (Some(round), Some(position)) = (round, position) {
                    views.push_back(RoundPositionView {
                        round_id,
                        round,
                        position,
                    });
                }
            }
        }
        views
    }

    /// Returns the accrued, not yet withdrawn protocol fee balance.
    pub fn get_protocol_fees(env: Env) -> i128 {
        env.storage()
            .persistent()
            .get(&DataKey::ProtocolFees)
            .unwrap_or(0)
    }

    pub fn get_round_window(env: Env) -> u64 {
        Self::_round_window(&env)
    }

    pub fn get_admin(env: Env) -> Option<Address> {
        env.storage().persistent().get(&DataKey::Admin)
    }

    pub fn get_oracle(env: Env) -> Option<Address> {
        env.storage().persistent().get(&DataKey::Oracle)
    }

    /// Mints a fixed starting balance for new users (one-time only)
    pub fn mint_initial(env: Env, user: Address) -> i128 {
        user.require_auth();

        let key = DataKey::Balance(user.clone());

        if let Some(existing_balance) = env.storage().persistent().get(&key) {
            return existing_balance;
        }

        let initial_amount: i128 = 1000_0000000;
        env.storage().persistent().set(&key, &initial_amount);

        initial_amount
    }

    /// Returns the user's internal balance
    pub fn balance(env: Env, user: Address) -> i128 {
        let key = DataKey::Balance(user);
        env.storage().persistent().get(&key).unwrap_or(0)
    }

    fn _predict(
        env: Env,
        account: Address,
        market_id: BytesN<32>,
        round_id: u32,
        amount: i128,
        side: Side,
    ) -> Result<(), ContractError> {
        account.require_auth();

        if !env
            .storage()
            .persistent()
            .has(&DataKey::Market(market_id.clone()))
        {
            return Err(ContractError::MarketNotInitialized);
        }

        // A round id with no entry counts as closed for entry.
        let mut round: Round = env
            .storage()
            .persistent()
            .get(&DataKey::Round(market_id.clone(), round_id))
            .ok_or(ContractError::EntryClosed)?;

        if env.ledger().timestamp() > round.lock_time {
            return Err(ContractError::EntryClosed);
        }

        if amount <= 0 {
            return Err(ContractError::AmountCannotBeZero);
        }

        let position_key = DataKey::Position(market_id.clone(), round_id, account.clone());
        if env.storage().persistent().has(&position_key) {
            return Err(ContractError::PositionExist);
        }

        Self::_debit(&env, account.clone(), amount)?;

        round.total_shares = round
            .total_shares
            .checked_add(amount)
            .ok_or(ContractError::Overflow)?;
        match side {
            Side::Up => {
                round.bull_shares = round
                    .bull_shares
                    .checked_add(amount)
                    .ok_or(ContractError::Overflow)?;
            }
            Side::Down => {
                round.bear_shares = round
                    .bear_shares
                    .checked_add(amount)
                    .ok_or(ContractError::Overflow)?;
            }
        }
        env.storage()
            .persistent()
            .set(&DataKey::Round(market_id.clone(), round_id), &round);

        let rounds_key = DataKey::UserRounds(market_id.clone(), account.clone());
        let mut participated: Vec<u32> = env
            .storage()
            .persistent()
            .get(&rounds_key)
            .unwrap_or(Vec::new(&env));
        participated.push_back(round_id);
        env.storage().persistent().set(&rounds_key, &participated);

        let position = Position {
            stake: amount,
            side: side.clone(),
            settled: false,
        };
        env.storage().persistent().set(&position_key, &position);

        #[allow(deprecated)]
        env.events().publish(
            (symbol_short!("position"), symbol_short!("predicted")),
            (market_id, round_id, account, side, amount),
        );

        Ok(())
    }

    /// Allocates and opens the market's next round.
    fn _open_round(
        env: &Env,
        market_id: &BytesN<32>,
        market: &mut Market,
    ) -> Result<u32, ContractError> {
        let round_id = market
            .current_round_id
            .checked_add(1)
            .ok_or(ContractError::Overflow)?;
        market.current_round_id = round_id;

        let now = env.ledger().timestamp();
        let window = Self::_round_window(env);
        let lock_time = now.checked_add(window).ok_or(ContractError::Overflow)?;
        let closing_time = lock_time.checked_add(window).ok_or(ContractError::Overflow)?;

        let round = Round {
            lock_time,
            closing_time,
            price_mark: 0,
            closing_price: 0,
            total_shares: 0,
            bull_shares: 0,
            bear_shares: 0,
            reward_pool: 0,
            winning_shares: 0,
            status: RoundStatus::Open,
            winning_side: WinningSide::None,
        };
        env.storage()
            .persistent()
            .set(&DataKey::Round(market_id.clone(), round_id), &round);

        #[allow(deprecated)]
        env.events().publish(
            (symbol_short!("round"), symbol_short!("new")),
            (market_id.clone(), round_id, lock_time, closing_time),
        );

        Ok(round_id)
    }

    /// Captures the strike price for an open round and puts it live.
    fn _lock_round(
        env: &Env,
        market_id: &BytesN<32>,
        round_id: u32,
        price: i128,
    ) -> Result<(), ContractError> {
        let key = DataKey::Round(market_id.clone(), round_id);
        let mut round: Round = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(ContractError::InvalidRoundStatus)?;

        if round.status != RoundStatus::Open {
            return Err(ContractError::InvalidRoundStatus);
        }

        let now = env.ledger().timestamp();
        let window = Self::_round_window(env);
        round.price_mark = price;
        round.closing_time = now.checked_add(window).ok_or(ContractError::Overflow)?;
        round.status = RoundStatus::Live;
        env.storage().persistent().set(&key, &round);

        #[allow(deprecated)]
        env.events().publish(
            (symbol_short!("price"), symbol_short!("locked")),
            (market_id.clone(), round_id, price, round.closing_time),
        );

        Ok(())
    }

    /// Determines the winner and books fees and the reward pool for a round.
    /// Returns the resolver incentive to pay out.
    fn _finalize_round(
        env: &Env,
        market_id: &BytesN<32>,
        round_id: u32,
        mut round: Round,
        closing_price: i128,
    ) -> Result<i128, ContractError> {
        round.closing_price = closing_price;

        if closing_price > round.price_mark {
            round.winning_side = WinningSide::Up;
            round.winning_shares = round.bull_shares;
        } else if closing_price < round.price_mark {
            round.winning_side = WinningSide::Down;
            round.winning_shares = round.bear_shares;
        } else {
            // Tie: no winner is assigned; the pool stays in the round.
            round.winning_side = WinningSide::None;
            round.winning_shares = 0;
        }

        let mut reward_pool = round.total_shares;
        let mut resolver_fee: i128 = 0;

        if round.total_shares > 0 {
            if round.bull_shares == 0 || round.bear_shares == 0 {
                // One-sided round: the pool goes to the protocol, less the
                // resolver incentive (a single 10% factor of the whole pool).
                resolver_fee = round
                    .total_shares
                    .checked_mul(FEE_BPS)
                    .ok_or(ContractError::Overflow)?
                    / BPS_DENOMINATOR;
                Self::_accrue_protocol_fees(env, round.total_shares - resolver_fee)?;
                reward_pool = 0;
            } else {
                let reward_base = match round.winning_side {
                    WinningSide::Up => round.bear_shares,
                    WinningSide::Down => round.bull_shares,
                    WinningSide::None => 0,
                };
                let protocol_fee = reward_base
                    .checked_mul(FEE_BPS)
                    .ok_or(ContractError::Overflow)?
                    / BPS_DENOMINATOR;
                resolver_fee = protocol_fee
                    .checked_mul(FEE_BPS)
                    .ok_or(ContractError::Overflow)?
                    / BPS_DENOMINATOR;
                reward_pool = round
                    .total_shares
                    .checked_sub(protocol_fee)
                    .ok_or(ContractError::Overflow)?;
                Self::_accrue_protocol_fees(env, protocol_fee - resolver_fee)?;
            }
        }

        round.reward_pool = reward_pool;
        round.status = RoundStatus::Resolved;
        env.storage()
            .persistent()
            .set(&DataKey::Round(market_id.clone(), round_id), &round);

        #[allow(deprecated)]
        env.events().publish(
            (symbol_short!("round"), symbol_short!("resolved")),
            (
                market_id.clone(),
                round_id,
                closing_price,
                round.reward_pool,
                round.winning_shares,
                round.winning_side,
                resolver_fee,
            ),
        );

        Ok(resolver_fee)
    }

    fn _round_window(env: &Env) -> u64 {
        env.storage()
            .persistent()
            .get(&DataKey::RoundWindowSecs)
            .unwrap_or(DEFAULT_ROUND_WINDOW_SECS)
    }

    fn _accrue_protocol_fees(env: &Env, amount: i128) -> Result<(), ContractError> {
        let current: i128 = env
            .storage()
            .persistent()
            .get(&DataKey::ProtocolFees)
            .unwrap_or(0);
        let new_total = current.checked_add(amount).ok_or(ContractError::Overflow)?;
        env.storage().persistent().set(&DataKey::ProtocolFees, &new_total);
        Ok(())
    }

    fn _set_balance(env: &Env, user: Address, amount: i128) {
        let key = DataKey::Balance(user);
        env.storage().persistent().set(&key, &amount);
    }

    fn _debit(env: &Env, user: Address, amount: i128) -> Result<(), ContractError> {
        let current = Self::balance(env.clone(), user.clone());
        if current < amount {
            return Err(ContractError::InsufficientBalance);
        }
        let new_balance = current.checked_sub(amount).ok_or(ContractError::Overflow)?;
        Self::_set_balance(env, user, new_balance);
        Ok(())
    }

    fn _credit(env: &Env, user: Address, amount: i128) -> Result<(), ContractError> {
        let current = Self::balance(env.clone(), user.clone());
        let new_balance = current.checked_add(amount).ok_or(ContractError::Overflow)?;
        Self::_set_balance(env, user, new_balance);
        Ok(())
    }
}
