//! Unstake Handler
//!
//! Withdraws a staker's liquidity proportionally, in basis points of
//! their units, and queues the outbound transfers. The payouts round
//! toward zero; dust stays in the pool.

use lib_types::{Asset, Bps, Chain, Tx, MAX_BASIS_POINTS};

use super::map_math_err;
use crate::constants::Constants;
use crate::errors::{codes, HandlerError, HandlerResult};
use crate::events::{self, EventPayload, EventStatus};
use crate::pool::math;
use crate::storage::Keeper;
use crate::txout::{self, TxOutItem};

pub fn run(
    keeper: &dyn Keeper,
    constants: &Constants,
    asset: &Asset,
    basis_points: Bps,
    tx: &Tx,
) -> HandlerResult<()> {
    if basis_points == 0 || basis_points > constants.max_unstake_basis_points.min(MAX_BASIS_POINTS)
    {
        return Err(HandlerError::validation(
            codes::INVALID_BASIS_POINTS,
            format!("withdraw basis points {basis_points} outside (0, 10000]"),
        ));
    }
    let mut pool = keeper.get_pool(asset)?.ok_or_else(|| {
        HandlerError::validation(codes::MISSING_POOL, format!("no pool for {asset}"))
    })?;

    let mut book = keeper.get_pool_staker(asset)?;
    let staker_units = book
        .get(&tx.from_address)
        .map(|s| s.units)
        .filter(|u| *u > 0)
        .ok_or_else(|| {
            HandlerError::validation(
                codes::INSUFFICIENT_FUNDS,
                format!("{} has no stake in {asset}", tx.from_address),
            )
        })?;

    let out = math::calculate_withdraw(
        pool.pool_units,
        pool.balance_rune,
        pool.balance_asset,
        staker_units,
        basis_points,
    )
    .map_err(map_math_err)?;

    pool.balance_rune = pool.balance_rune.checked_sub(out.rune_out).ok_or_else(|| {
        HandlerError::InvariantViolation("withdraw exceeds pool rune balance".to_string())
    })?;
    pool.balance_asset = pool.balance_asset.checked_sub(out.asset_out).ok_or_else(|| {
        HandlerError::InvariantViolation("withdraw exceeds pool asset balance".to_string())
    })?;
    pool.pool_units = pool.pool_units.checked_sub(out.withdraw_units).ok_or_else(|| {
        HandlerError::InvariantViolation("withdraw exceeds pool units".to_string())
    })?;
    keeper.set_pool(&pool)?;

    let entry = book.entry(&tx.from_address);
    entry.units = entry.units.saturating_sub(out.withdraw_units);
    book.total_units = book.total_units.checked_sub(out.withdraw_units).ok_or_else(|| {
        HandlerError::InvariantViolation("withdraw exceeds staker book units".to_string())
    })?;
    book.prune();
    keeper.set_pool_staker(&book)?;

    tracing::info!(
        %asset,
        staker = %tx.from_address,
        basis_points,
        rune_out = out.rune_out,
        asset_out = out.asset_out,
        "unstake accepted"
    );
    events::record(
        keeper,
        tx.clone(),
        EventStatus::Pending,
        EventPayload::Unstake {
            pool: asset.clone(),
            stake_units: out.withdraw_units,
            basis_points,
            asymmetry: 0,
        },
    )?;

    if out.rune_out > 0 {
        let item = TxOutItem::new(
            Chain::native(),
            tx.from_address.clone(),
            Asset::native_rune(),
            out.rune_out,
            tx.id.clone(),
            format!("outbound:{}", tx.id),
        );
        txout::try_add_tx_out_item(keeper, constants, item)?;
    }
    if out.asset_out > 0 {
        let item = TxOutItem::new(
            asset.chain.clone(),
            tx.from_address.clone(),
            asset.clone(),
            out.asset_out,
            tx.id.clone(),
            format!("outbound:{}", tx.id),
        );
        txout::try_add_tx_out_item(keeper, constants, item)?;
    }
    Ok(())
}
