//! Event Log
//!
//! Every non-noop inbound produces exactly one typed event in the block
//! that processed it. The log is append-only and consumed by external
//! indexers; the core itself only re-reads `Pending` events, which exist
//! to be reconciled when their outbound halves are observed. Pruning is
//! the indexer's responsibility.

use serde::{Deserialize, Serialize};
use std::fmt;

use lib_types::{Address, Amount, Asset, Bps, Coins, PubKey, Tx, TxId};

use crate::errors::HandlerResult;
use crate::pool::PoolStatus;
use crate::storage::Keeper;

/// Where an event is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    /// Waiting for an outbound confirmation.
    Pending,
    Success,
    Refund,
}

/// A signed pool-balance adjustment, as recorded by slash and errata
/// events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMod {
    pub asset: Asset,
    pub rune_amt: Amount,
    pub rune_add: bool,
    pub asset_amt: Amount,
    pub asset_add: bool,
}

/// Per-pool gas reimbursement line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPool {
    pub asset: Asset,
    pub asset_amt: Amount,
    pub rune_amt: Amount,
    pub tx_count: u64,
}

/// Per-pool signed amount line (rewards add, slashes may subtract).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAmount {
    pub asset: Asset,
    pub amount: i128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondType {
    Paid,
    Returned,
}

/// The typed payload of an event; one variant per event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    Swap {
        pool: Asset,
        price_target: Amount,
        trade_slip: Bps,
        liquidity_fee: Amount,
        liquidity_fee_in_rune: Amount,
    },
    Stake {
        pool: Asset,
        stake_units: Amount,
    },
    Unstake {
        pool: Asset,
        stake_units: Amount,
        basis_points: Bps,
        /// Signed fixed-point in [-1, 1] scaled by 10^8; zero for the
        /// proportional withdrawals this core performs.
        asymmetry: i64,
    },
    Add {
        pool: Asset,
    },
    Pool {
        pool: Asset,
        status: PoolStatus,
    },
    Rewards {
        bond_reward: Amount,
        pool_rewards: Vec<PoolAmount>,
    },
    Refund {
        code: u32,
        reason: String,
    },
    Bond {
        amount: Amount,
        bond_type: BondType,
    },
    Gas {
        pools: Vec<GasPool>,
    },
    Reserve {
        contributor: Address,
        amount: Amount,
    },
    Slash {
        pool: Asset,
        amounts: Vec<PoolAmount>,
    },
    Errata {
        tx_id: TxId,
        pools: Vec<PoolMod>,
    },
    Yggdrasil {
        pub_key: PubKey,
        coins: Coins,
        fund: bool,
    },
}

impl EventPayload {
    /// Stable type tag carried in the envelope (and used by indexers).
    pub fn type_name(&self) -> &'static str {
        match self {
            EventPayload::Swap { .. } => "swap",
            EventPayload::Stake { .. } => "stake",
            EventPayload::Unstake { .. } => "unstake",
            EventPayload::Add { .. } => "add",
            EventPayload::Pool { .. } => "pool",
            EventPayload::Rewards { .. } => "rewards",
            EventPayload::Refund { .. } => "refund",
            EventPayload::Bond { .. } => "bond",
            EventPayload::Gas { .. } => "gas",
            EventPayload::Reserve { .. } => "reserve",
            EventPayload::Slash { .. } => "slash",
            EventPayload::Errata { .. } => "errata",
            EventPayload::Yggdrasil { .. } => "yggdrasil",
        }
    }
}

/// The envelope persisted for every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic, claimed from the keeper's sequence.
    pub id: u64,
    pub height: u64,
    pub event_type: String,
    pub in_tx: Tx,
    pub out_txs: Vec<Tx>,
    /// Network fee charged against the outbound(s).
    pub fee: Coins,
    pub status: EventStatus,
    pub payload: EventPayload,
}

impl Event {
    /// JSON rendering of the payload, the shape indexers consume.
    pub fn payload_json(&self) -> String {
        serde_json::to_string(&self.payload).unwrap_or_default()
    }

    pub fn new(id: u64, height: u64, in_tx: Tx, status: EventStatus, payload: EventPayload) -> Self {
        Self {
            id,
            height,
            event_type: payload.type_name().to_string(),
            in_tx,
            out_txs: Vec::new(),
            fee: Coins::new(),
            status,
            payload,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "event #{} {} at {} ({:?})",
            self.id, self.event_type, self.height, self.status
        )
    }
}

/// Append a new event at the current block height, claiming the next id.
pub fn record(
    keeper: &dyn Keeper,
    in_tx: Tx,
    status: EventStatus,
    payload: EventPayload,
) -> HandlerResult<Event> {
    let id = keeper.next_event_id()?;
    let height = keeper.current_height()?;
    let event = Event::new(id, height, in_tx, status, payload);
    tracing::debug!(
        id,
        kind = event.event_type.as_str(),
        payload = event.payload_json().as_str(),
        "recording event"
    );
    keeper.append_event(&event)?;
    Ok(event)
}

/// Reconcile the pending event for `in_hash` with an observed outbound:
/// attach the outbound tx and flip the status to `Success`.
pub fn complete(keeper: &dyn Keeper, in_hash: &TxId, out_tx: &Tx) -> HandlerResult<Option<Event>> {
    let Some(mut event) = keeper.get_pending_event_by_in_hash(in_hash)? else {
        return Ok(None);
    };
    event.out_txs.push(out_tx.clone());
    event.status = EventStatus::Success;
    keeper.update_event(&event)?;
    Ok(Some(event))
}
