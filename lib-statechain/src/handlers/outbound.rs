//! Outbound Confirmation Handler
//!
//! Signers report back by way of the chain itself: the observer sees the
//! signed transfer leave a vault and submits it with the originating
//! inbound's id. Here the queued item gets its `out_hash`, the paying
//! vault's ledger settles, the gas the transfer burned is reimbursed to
//! the gas asset's pool from the reserve, and the pending event for the
//! inbound reconciles to `Success`.
//!
//! Re-observations are no-ops: once an item is signed it matches nothing.

use lib_types::{Tx, TxId};

use crate::constants::Constants;
use crate::errors::HandlerResult;
use crate::events::{self, EventPayload, EventStatus, GasPool};
use crate::storage::Keeper;
use crate::txout;

pub fn run(
    keeper: &dyn Keeper,
    _constants: &Constants,
    observed: &Tx,
    in_hash: TxId,
) -> HandlerResult<()> {
    let Some(item) = txout::complete_tx_out_item(keeper, &in_hash, observed)? else {
        tracing::warn!(tx = %observed.id, in_hash = %in_hash, "observed outbound matches nothing in the queue");
        return Ok(());
    };
    tracing::info!(%item, out = %observed.id, "outbound confirmed");

    reimburse_gas(keeper, observed)?;

    if !in_hash.is_blank() {
        events::complete(keeper, &in_hash, observed)?;
    }
    Ok(())
}

/// Pay the gas a vault burned back to the gas asset's pool: the pool
/// writes the burned asset down and takes its RUNE value out of the
/// reserve, keeping stakers whole.
fn reimburse_gas(keeper: &dyn Keeper, observed: &Tx) -> HandlerResult<()> {
    if observed.gas.is_empty() {
        return Ok(());
    }
    let mut pools = Vec::new();
    let mut reserve = keeper.get_reserve()?;
    for gas_coin in observed.gas.iter() {
        if gas_coin.asset.is_rune() || gas_coin.amount == 0 {
            continue;
        }
        let Some(mut pool) = keeper.get_pool(&gas_coin.asset)? else {
            continue;
        };
        let rune_value = pool.asset_value_in_rune(gas_coin.amount).min(reserve);
        pool.balance_asset = pool.balance_asset.saturating_sub(gas_coin.amount);
        pool.balance_rune = pool.balance_rune.saturating_add(rune_value);
        reserve -= rune_value;
        keeper.set_pool(&pool)?;
        pools.push(GasPool {
            asset: gas_coin.asset.clone(),
            asset_amt: gas_coin.amount,
            rune_amt: rune_value,
            tx_count: 1,
        });
    }
    if pools.is_empty() {
        return Ok(());
    }
    keeper.set_reserve(reserve)?;
    events::record(
        keeper,
        observed.clone(),
        EventStatus::Success,
        EventPayload::Gas { pools },
    )?;
    Ok(())
}
