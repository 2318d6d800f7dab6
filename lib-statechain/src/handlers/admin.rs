//! Administrative Handlers
//!
//! Pool status toggles, balance top-ups, reserve contributions, errata
//! reversals, and network-fee reports. None of these mint pool units.

use lib_types::{Address, Amount, Asset, Chain, Tx, TxId};

use super::internal_tx;
use crate::errors::{codes, HandlerError, HandlerResult};
use crate::events::{self, EventPayload, EventStatus, PoolMod};
use crate::pool::{Pool, PoolStatus};
use crate::storage::Keeper;

/// Toggle a pool's lifecycle status. `Enabled ⇄ Bootstrap` freely;
/// `Suspended` is terminal.
pub fn set_pool_data(keeper: &dyn Keeper, asset: &Asset, status: PoolStatus) -> HandlerResult<()> {
    let mut pool = keeper
        .get_pool(asset)?
        .unwrap_or_else(|| Pool::new(asset.clone()));
    if pool.status == PoolStatus::Suspended && status != PoolStatus::Suspended {
        return Err(HandlerError::validation(
            codes::POOL_DISABLED,
            format!("pool {asset} is suspended; suspension is terminal"),
        ));
    }
    tracing::info!(%asset, from = %pool.status, to = %status, "pool status change");
    pool.status = status;
    keeper.set_pool(&pool)?;
    events::record(
        keeper,
        internal_tx(),
        EventStatus::Success,
        EventPayload::Pool { pool: asset.clone(), status },
    )?;
    Ok(())
}

/// Fold funds into a pool's balances without minting units (donation).
pub fn add(
    keeper: &dyn Keeper,
    asset: &Asset,
    rune_amount: Amount,
    asset_amount: Amount,
    tx: &Tx,
) -> HandlerResult<()> {
    let mut pool = keeper
        .get_pool(asset)?
        .unwrap_or_else(|| Pool::new(asset.clone()));
    pool.balance_rune = pool
        .balance_rune
        .checked_add(rune_amount)
        .ok_or_else(|| HandlerError::InvariantViolation("pool rune overflow".to_string()))?;
    pool.balance_asset = pool
        .balance_asset
        .checked_add(asset_amount)
        .ok_or_else(|| HandlerError::InvariantViolation("pool asset overflow".to_string()))?;
    keeper.set_pool(&pool)?;
    tracing::info!(%asset, rune_amount, asset_amount, "added to pool without units");
    events::record(
        keeper,
        tx.clone(),
        EventStatus::Success,
        EventPayload::Add { pool: asset.clone() },
    )?;
    Ok(())
}

/// Credit the protocol reserve.
pub fn reserve(
    keeper: &dyn Keeper,
    contributor: &Address,
    amount: Amount,
    tx: &Tx,
) -> HandlerResult<()> {
    let reserve = keeper
        .get_reserve()?
        .checked_add(amount)
        .ok_or_else(|| HandlerError::InvariantViolation("reserve overflow".to_string()))?;
    keeper.set_reserve(reserve)?;
    tracing::info!(%contributor, amount, reserve, "reserve contribution");
    events::record(
        keeper,
        tx.clone(),
        EventStatus::Success,
        EventPayload::Reserve { contributor: contributor.clone(), amount },
    )?;
    Ok(())
}

/// Reverse the pool effect of a previously applied transaction: the coins
/// its event recorded going in are backed out again.
pub fn errata(keeper: &dyn Keeper, tx_id: &TxId) -> HandlerResult<()> {
    let Some(original) = keeper
        .iterate_events()?
        .into_iter()
        .filter(|e| &e.in_tx.id == tx_id)
        .next_back()
    else {
        return Err(HandlerError::validation(
            codes::INVALID_MESSAGE,
            format!("no recorded event for tx {tx_id}"),
        ));
    };

    let rune_amount = original.in_tx.coins.get(&Asset::native_rune());
    let asset_coin = original
        .in_tx
        .coins
        .iter()
        .find(|c| !c.asset.is_rune())
        .cloned();
    let Some(asset_coin) = asset_coin else {
        return Err(HandlerError::validation(
            codes::INVALID_MESSAGE,
            format!("tx {tx_id} moved no pool asset, nothing to reverse"),
        ));
    };

    let mut pool = keeper.get_pool(&asset_coin.asset)?.ok_or_else(|| {
        HandlerError::validation(
            codes::MISSING_POOL,
            format!("no pool for {}", asset_coin.asset),
        )
    })?;
    pool.balance_rune = pool.balance_rune.saturating_sub(rune_amount);
    pool.balance_asset = pool.balance_asset.saturating_sub(asset_coin.amount);
    keeper.set_pool(&pool)?;

    tracing::info!(tx = %tx_id, pool = %asset_coin.asset, "errata reversed pool mutation");
    events::record(
        keeper,
        original.in_tx.clone(),
        EventStatus::Success,
        EventPayload::Errata {
            tx_id: tx_id.clone(),
            pools: vec![PoolMod {
                asset: asset_coin.asset.clone(),
                rune_amt: rune_amount,
                rune_add: false,
                asset_amt: asset_coin.amount,
                asset_add: false,
            }],
        },
    )?;
    Ok(())
}

/// Record the observed network-fee rate for a chain; outbound gas uses it
/// from the next message on.
pub fn network_fee(keeper: &dyn Keeper, chain: &Chain, fee: Amount) -> HandlerResult<()> {
    tracing::info!(%chain, fee, "network fee updated");
    Ok(keeper.set_network_fee(chain, fee)?)
}
