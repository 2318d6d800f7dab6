//! Dispatch Engine
//!
//! Single entry point for consensus messages: shape validation, protocol
//! version gate, signer authorization, then one `match` routing to the
//! handler. Refundable failures on fund-carrying messages become refund
//! events here, so the host only ever sees typed results for drops
//! (authorization, version) and fatal failures (invariants, storage).

use crate::constants::Constants;
use crate::errors::{HandlerError, HandlerResult};
use crate::handlers::{self, admin, bond, observed, outbound, stake, swap, tss, unstake, yggdrasil};
use crate::messages::{Message, MessageBody};
use crate::storage::Keeper;

/// What the handlers run against. The keeper carries all state; the TSS
/// oracle and external signers are reached through the records the
/// handlers persist.
pub struct Deps<'a> {
    pub keeper: &'a dyn Keeper,
}

impl<'a> Deps<'a> {
    pub fn new(keeper: &'a dyn Keeper) -> Self {
        Self { keeper }
    }
}

/// Validate, authorize, and execute one consensus message.
pub fn handle(deps: &Deps<'_>, msg: &Message) -> HandlerResult<()> {
    msg.validate_basic()?;

    let version = deps.keeper.get_version()?;
    let constants =
        Constants::for_version(version).ok_or(HandlerError::BadVersion { version })?;

    authorize(deps.keeper, msg)?;

    let keeper = deps.keeper;
    tracing::debug!(kind = msg.body.kind(), "dispatching");
    let result = match msg.body.clone() {
        MessageBody::SetPoolData { asset, status } => {
            admin::set_pool_data(keeper, &asset, status)
        }
        MessageBody::SetStakeData { asset, rune_amount, asset_amount, staker_address, tx } => {
            stake::run(keeper, constants, &asset, rune_amount, asset_amount, &staker_address, &tx)
                .or_else(|err| refund_or_raise(keeper, constants, &tx, err))
        }
        MessageBody::Unstake { asset, basis_points, tx } => {
            unstake::run(keeper, constants, &asset, basis_points, &tx)
                .or_else(|err| refund_or_raise(keeper, constants, &tx, err))
        }
        MessageBody::Swap { target_asset, destination, price_limit, tx } => {
            swap::run(keeper, constants, &target_asset, &destination, price_limit, &tx)
                .or_else(|err| refund_or_raise(keeper, constants, &tx, err))
        }
        MessageBody::ObservedTxIn { txs } => observed::run(keeper, constants, &txs),
        MessageBody::SetTxOutComplete { tx, in_tx_id } => {
            outbound::run(keeper, constants, &tx, in_tx_id)
        }
        MessageBody::Bond { node_address, bond, bond_address, tx } => {
            handlers::bond::bond(keeper, constants, &node_address, bond, &bond_address, &tx)
                .or_else(|err| refund_or_raise(keeper, constants, &tx, err))
        }
        MessageBody::Leave { tx } => bond::leave(keeper, constants, &tx),
        MessageBody::Yggdrasil { pub_key, add_funds, coins, tx } => {
            yggdrasil::run(keeper, constants, &pub_key, add_funds, coins, &tx)
        }
        MessageBody::Reserve { contributor, amount, tx } => {
            admin::reserve(keeper, &contributor, amount, &tx)
        }
        MessageBody::Add { asset, rune_amount, asset_amount, tx } => {
            admin::add(keeper, &asset, rune_amount, asset_amount, &tx)
        }
        MessageBody::Errata { tx_id, .. } => admin::errata(keeper, &tx_id),
        MessageBody::TssPool { pub_key, members, keygen_height } => {
            tss::tss_pool(keeper, pub_key, members, keygen_height)
        }
        MessageBody::TssKeysignFail { blame, .. } => {
            tss::tss_keysign_fail(keeper, constants, &blame)
        }
        MessageBody::NetworkFee { chain, fee } => admin::network_fee(keeper, &chain, fee),
    };
    if let Err(err) = &result {
        tracing::warn!(kind = msg.body.kind(), %err, "message failed");
    }
    result
}

/// Turn a refundable failure on a fund-carrying message into a refund
/// event; re-raise everything else.
fn refund_or_raise(
    keeper: &dyn Keeper,
    constants: &Constants,
    tx: &lib_types::Tx,
    err: HandlerError,
) -> HandlerResult<()> {
    if err.is_refundable() && !tx.coins.is_empty() {
        return handlers::refund(keeper, constants, tx, err.code(), err.to_string());
    }
    Err(err)
}

/// Every signer must be an Active node; except bonding, which is how a
/// stranger becomes a node in the first place.
fn authorize(keeper: &dyn Keeper, msg: &Message) -> HandlerResult<()> {
    if matches!(msg.body, MessageBody::Bond { .. }) {
        return Ok(());
    }
    for signer in &msg.signers {
        let active = keeper
            .get_node_account(signer)?
            .map(|na| na.is_active())
            .unwrap_or(false);
        if !active {
            return Err(HandlerError::Unauthorized(format!(
                "{signer} is not an active node account"
            )));
        }
    }
    Ok(())
}
