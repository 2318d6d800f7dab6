//! Stake Handler
//!
//! Adds liquidity to a pool, minting pool units for the staker. The first
//! stake into an unknown asset creates the pool.

use lib_types::{Address, Amount, Asset, Tx};

use super::map_math_err;
use crate::constants::Constants;
use crate::errors::{codes, HandlerError, HandlerResult};
use crate::events::{self, EventPayload, EventStatus};
use crate::pool::math;
use crate::pool::{Pool, PoolStatus};
use crate::storage::Keeper;

pub fn run(
    keeper: &dyn Keeper,
    constants: &Constants,
    asset: &Asset,
    rune_amount: Amount,
    asset_amount: Amount,
    staker_address: &Address,
    tx: &Tx,
) -> HandlerResult<()> {
    if asset.is_rune() {
        return Err(HandlerError::validation(
            codes::UNKNOWN_ASSET,
            "cannot stake the native asset against itself",
        ));
    }
    if staker_address.is_empty() {
        return Err(HandlerError::validation(
            codes::INVALID_MESSAGE,
            "stake has no staker address",
        ));
    }

    let mut pool = match keeper.get_pool(asset)? {
        Some(pool) => pool,
        None => {
            // New pools open in Bootstrap: stakeable immediately, but no
            // swaps until an admin lists the asset via SetPoolData.
            tracing::info!(%asset, "first stake creates bootstrap pool");
            let mut pool = Pool::new(asset.clone());
            pool.vault_address = tx.to_address.clone();
            pool
        }
    };
    if pool.status == PoolStatus::Suspended {
        return Err(HandlerError::validation(
            codes::POOL_DISABLED,
            format!("pool {asset} is suspended"),
        ));
    }

    let (new_pool_units, staker_units) = math::calculate_pool_units(
        pool.pool_units,
        pool.balance_rune,
        pool.balance_asset,
        rune_amount,
        asset_amount,
    )
    .map_err(map_math_err)?;

    let mut book = keeper.get_pool_staker(asset)?;
    let floor = math::minimum_stake_units(
        book.len() as u64,
        book.total_units,
        constants.stake_amount_interval,
    );
    if staker_units < floor {
        return Err(HandlerError::validation(
            codes::STAKE_TOO_SMALL,
            format!("stake mints {staker_units} units, below the pool floor of {floor}"),
        ));
    }

    pool.balance_rune = pool
        .balance_rune
        .checked_add(rune_amount)
        .ok_or_else(|| HandlerError::InvariantViolation("pool rune overflow".to_string()))?;
    pool.balance_asset = pool
        .balance_asset
        .checked_add(asset_amount)
        .ok_or_else(|| HandlerError::InvariantViolation("pool asset overflow".to_string()))?;
    pool.pool_units = new_pool_units;
    keeper.set_pool(&pool)?;

    let entry = book.entry(staker_address);
    entry.units = entry
        .units
        .checked_add(staker_units)
        .ok_or_else(|| HandlerError::InvariantViolation("staker unit overflow".to_string()))?;
    book.total_units = book
        .total_units
        .checked_add(staker_units)
        .ok_or_else(|| HandlerError::InvariantViolation("staker book overflow".to_string()))?;
    keeper.set_pool_staker(&book)?;

    tracing::info!(%asset, staker = %staker_address, staker_units, "stake accepted");
    events::record(
        keeper,
        tx.clone(),
        EventStatus::Success,
        EventPayload::Stake { pool: asset.clone(), stake_units: staker_units },
    )?;
    Ok(())
}
