//! Swap Handler
//!
//! Routes a swap through one pool (RUNE on either side) or two pools (a
//! double swap decomposed through RUNE), enforces the caller's price
//! limit, and queues the outbound to the destination.
//!
//! Legs are priced before anything is applied: a breached price limit
//! refunds the inbound and must leave every pool exactly as it found it.

use lib_types::{Address, Amount, Asset, Bps, Chain, Tx};

use super::map_math_err;
use crate::constants::Constants;
use crate::errors::{codes, HandlerError, HandlerResult};
use crate::events::{self, EventPayload, EventStatus};
use crate::pool::math::{self, SwapOutcome};
use crate::pool::Pool;
use crate::storage::Keeper;
use crate::txout::{self, TxOutItem};

/// One priced leg, not yet applied.
struct Leg {
    pool: Pool,
    input: Amount,
    /// RUNE entering the pool (asset leaves) vs. the asset entering
    /// (RUNE leaves).
    rune_in: bool,
    outcome: SwapOutcome,
}

pub fn run(
    keeper: &dyn Keeper,
    constants: &Constants,
    target_asset: &Asset,
    destination: &Address,
    price_limit: Amount,
    tx: &Tx,
) -> HandlerResult<()> {
    let source = tx
        .coins
        .iter()
        .find(|c| c.amount > 0)
        .cloned()
        .ok_or_else(|| {
            HandlerError::validation(codes::INVALID_MESSAGE, "swap carries no funds")
        })?;
    if &source.asset == target_asset {
        return Err(HandlerError::validation(
            codes::INVALID_MESSAGE,
            "swap source and target are the same asset",
        ));
    }
    let destination = if destination.is_empty() {
        tx.from_address.clone()
    } else {
        destination.clone()
    };

    // Price every leg before touching state.
    let mut legs: Vec<Leg> = Vec::with_capacity(2);
    if source.asset.is_rune() {
        legs.push(price_leg(keeper, target_asset, source.amount, true)?);
    } else if target_asset.is_rune() {
        legs.push(price_leg(keeper, &source.asset, source.amount, false)?);
    } else {
        // Double swap: source -> RUNE -> target, each leg in its own pool.
        let first = price_leg(keeper, &source.asset, source.amount, false)?;
        let second = price_leg(keeper, target_asset, first.outcome.output, true)?;
        legs.push(first);
        legs.push(second);
    }

    let last = legs.last().ok_or_else(|| {
        HandlerError::InvariantViolation("swap routed through no pool".to_string())
    })?;
    let output = last.outcome.output;
    let event_pool = last.pool.asset.clone();
    let liquidity_fee = last.outcome.liquidity_fee;
    if output == 0 {
        return Err(HandlerError::validation(
            codes::INSUFFICIENT_LIQUIDITY,
            "swap output rounds to zero",
        ));
    }
    // The caller's floor: anything below it bounces back as a refund,
    // with no pool mutated.
    if price_limit > 0 && output < price_limit {
        return Err(HandlerError::validation(
            codes::SWAP_FAIL_SLIP,
            format!("output {output} below the price limit {price_limit}"),
        ));
    }

    let mut trade_slip: Bps = 0;
    let mut fee_in_rune: Amount = 0;
    for leg in legs {
        trade_slip = trade_slip.saturating_add(leg.outcome.trade_slip);
        fee_in_rune = fee_in_rune.saturating_add(apply_leg(keeper, leg)?);
    }

    tracing::info!(
        source = %source.asset,
        target = %target_asset,
        input = source.amount,
        output,
        trade_slip,
        "swap accepted"
    );
    events::record(
        keeper,
        tx.clone(),
        EventStatus::Pending,
        EventPayload::Swap {
            pool: event_pool,
            price_target: price_limit,
            trade_slip,
            liquidity_fee,
            liquidity_fee_in_rune: fee_in_rune,
        },
    )?;

    let out_chain = if target_asset.is_rune() {
        Chain::native()
    } else {
        target_asset.chain.clone()
    };
    let item = TxOutItem::new(
        out_chain,
        destination,
        target_asset.clone(),
        output,
        tx.id.clone(),
        format!("outbound:{}", tx.id),
    );
    txout::try_add_tx_out_item(keeper, constants, item)?;
    Ok(())
}

/// Fetch a pool, check it can trade, and price one leg against it.
fn price_leg(
    keeper: &dyn Keeper,
    pool_asset: &Asset,
    input: Amount,
    rune_in: bool,
) -> HandlerResult<Leg> {
    let pool = keeper.get_pool(pool_asset)?.ok_or_else(|| {
        HandlerError::validation(codes::MISSING_POOL, format!("no pool for {pool_asset}"))
    })?;
    if !pool.is_enabled() {
        return Err(HandlerError::validation(
            codes::POOL_DISABLED,
            format!("pool {pool_asset} is not enabled for swapping"),
        ));
    }
    if !pool.has_liquidity() {
        return Err(HandlerError::validation(
            codes::INSUFFICIENT_LIQUIDITY,
            format!("pool {pool_asset} has no liquidity"),
        ));
    }

    let (reserve_in, reserve_out) = if rune_in {
        (pool.balance_rune, pool.balance_asset)
    } else {
        (pool.balance_asset, pool.balance_rune)
    };
    let outcome = math::swap(input, reserve_in, reserve_out).map_err(map_math_err)?;
    if outcome.output >= reserve_out {
        return Err(HandlerError::validation(
            codes::INSUFFICIENT_LIQUIDITY,
            format!("pool {pool_asset} cannot cover the swap output"),
        ));
    }
    Ok(Leg { pool, input, rune_in, outcome })
}

/// Apply a priced leg to its pool. Returns the leg's liquidity fee valued
/// in RUNE (at the post-trade price for asset-side fees).
fn apply_leg(keeper: &dyn Keeper, leg: Leg) -> HandlerResult<Amount> {
    let Leg { mut pool, input, rune_in, outcome } = leg;
    if rune_in {
        pool.balance_rune = pool
            .balance_rune
            .checked_add(input)
            .ok_or_else(|| HandlerError::InvariantViolation("pool rune overflow".to_string()))?;
        pool.balance_asset -= outcome.output;
    } else {
        pool.balance_asset = pool
            .balance_asset
            .checked_add(input)
            .ok_or_else(|| HandlerError::InvariantViolation("pool asset overflow".to_string()))?;
        pool.balance_rune -= outcome.output;
    }
    let fee_in_rune = if rune_in {
        pool.asset_value_in_rune(outcome.liquidity_fee)
    } else {
        outcome.liquidity_fee
    };
    keeper.set_pool(&pool)?;
    Ok(fee_in_rune)
}
