//! Message Handlers
//!
//! One module per action kind. Handlers are free functions over the
//! keeper: they validate, mutate state, record exactly one event, and may
//! enqueue outbounds. None of them talks to external chains and none of
//! them suspends; a handler either completes synchronously or returns a
//! typed error.
//!
//! Failure discipline: a refundable validation failure after funds were
//! received becomes a `refund` event plus outbounds returning the coins
//! (minus gas); storage failures and accounting violations propagate and
//! abort the block.

pub mod admin;
pub mod bond;
pub mod observed;
pub mod outbound;
pub mod ragnarok;
pub mod stake;
pub mod swap;
pub mod tss;
pub mod unstake;
pub mod yggdrasil;

use lib_types::{Address, Chain, Coins, Tx, TxId};

use crate::constants::Constants;
use crate::errors::{codes, HandlerError, HandlerResult};
use crate::events::{self, EventPayload, EventStatus};
use crate::pool::math::MathError;
use crate::storage::Keeper;
use crate::txout::{self, TxOutItem};

/// Map pure-math failures onto the handler taxonomy: overflow is an
/// accounting violation, everything else is refundable.
pub(crate) fn map_math_err(err: MathError) -> HandlerError {
    match err {
        MathError::Overflow => HandlerError::InvariantViolation(err.to_string()),
        MathError::ZeroInput => HandlerError::validation(codes::INVALID_MESSAGE, err.to_string()),
        MathError::EmptyPool => {
            HandlerError::validation(codes::INSUFFICIENT_LIQUIDITY, err.to_string())
        }
        MathError::ZeroRuneSide | MathError::ZeroAssetSide => {
            HandlerError::validation(codes::INSUFFICIENT_FUNDS, err.to_string())
        }
    }
}

/// Send the coins of `tx` back to their sender (minus gas) and record the
/// `refund` event explaining why.
pub fn refund(
    keeper: &dyn Keeper,
    constants: &Constants,
    tx: &Tx,
    code: u32,
    reason: impl Into<String>,
) -> HandlerResult<()> {
    let reason = reason.into();
    tracing::info!(tx = %tx.id, code, reason = reason.as_str(), "refunding inbound");
    let fee = txout::expected_gas_fee(keeper, constants, &tx.chain)?;
    for coin in tx.coins.iter() {
        // Coins the network fee would consume entirely stay put; the
        // refund event below is still the caller's receipt.
        if !tx.chain.is_native() && coin.amount <= fee {
            tracing::debug!(tx = %tx.id, coin = %coin, "refund amount below the network fee");
            continue;
        }
        let item = TxOutItem::new(
            tx.chain.clone(),
            tx.from_address.clone(),
            coin.asset.clone(),
            coin.amount,
            tx.id.clone(),
            format!("refund:{}", tx.id),
        );
        match txout::try_add_tx_out_item(keeper, constants, item) {
            Ok(_) => {}
            // A refund that cannot find a funded vault still gets its
            // event; the coins stay where they landed for operators.
            Err(err) if err.is_refundable() => {
                tracing::warn!(tx = %tx.id, %err, "could not queue refund outbound");
            }
            Err(err) => return Err(err),
        }
    }
    events::record(
        keeper,
        tx.clone(),
        EventStatus::Refund,
        EventPayload::Refund { code, reason },
    )?;
    Ok(())
}

/// Synthetic inbound used by events that have no originating transfer
/// (rewards, admin actions).
pub(crate) fn internal_tx() -> Tx {
    Tx::new(
        TxId::blank(),
        Chain::native(),
        Address::empty(),
        Address::empty(),
        Coins::new(),
        Coins::new(),
        String::new(),
    )
}
