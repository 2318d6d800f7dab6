//! The Keeper: Typed State Access over an Ordered Keyed Store
//!
//! All consensus state flows through the [`Keeper`] trait. The invariants
//! here are non-negotiable:
//!
//! 1. **Writes only inside a block transaction**: every mutation happens
//!    between `begin_block` and `commit_block`; `rollback_block` restores
//!    the exact pre-block state.
//! 2. **Read-your-writes within a block**: messages in a block execute
//!    sequentially and each sees the effects of its predecessors.
//! 3. **Canonical encoding**: values cross the storage boundary in a
//!    deterministic binary encoding so every node stores identical bytes.
//! 4. **No retries**: a failed store operation surfaces as a
//!    `StoreError{op, key, cause}`; the host treats it as fatal.

pub mod keys;
pub mod sled_store;

use thiserror::Error;

pub use sled_store::SledKeeper;

use lib_types::{Address, Amount, Asset, BlockHeight, Chain, PubKey, TxId};

use crate::events::Event;
use crate::node_account::NodeAccount;
use crate::pool::{Pool, PoolStaker};
use crate::tss::Keygens;
use crate::txout::TxOutItem;
use crate::vault::{Vault, VaultKind, VaultStatus};

/// Error from the keyed store. Keepers never retry; the block aborts.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store {op} on {key} failed: {cause}")]
    Database { op: &'static str, key: String, cause: String },

    #[error("corrupted value at {key} during {op}: {cause}")]
    Corrupted { op: &'static str, key: String, cause: String },

    #[error("state write outside a block transaction")]
    NoActiveTransaction,
}

impl StoreError {
    pub fn database(op: &'static str, key: impl Into<String>, cause: impl ToString) -> Self {
        Self::Database { op, key: key.into(), cause: cause.to_string() }
    }

    pub fn corrupted(op: &'static str, key: impl Into<String>, cause: impl ToString) -> Self {
        Self::Corrupted { op, key: key.into(), cause: cause.to_string() }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed, transactional access to every entity family the state machine
/// persists. One implementation backs production ([`SledKeeper`]); tests
/// use the same implementation on a temporary database.
pub trait Keeper {
    // =========================================================================
    // Block transaction lifecycle
    // =========================================================================

    /// Open the write window for `height`. Exactly one may be active.
    fn begin_block(&self, height: BlockHeight) -> StoreResult<()>;

    /// Atomically persist everything written since `begin_block`.
    fn commit_block(&self) -> StoreResult<()>;

    /// Discard everything written since `begin_block`.
    fn rollback_block(&self) -> StoreResult<()>;

    /// Height of the open block transaction.
    fn current_height(&self) -> StoreResult<BlockHeight>;

    // =========================================================================
    // Pools and stakers
    // =========================================================================

    fn get_pool(&self, asset: &Asset) -> StoreResult<Option<Pool>>;
    fn set_pool(&self, pool: &Pool) -> StoreResult<()>;
    fn pool_exists(&self, asset: &Asset) -> StoreResult<bool> {
        Ok(self.get_pool(asset)?.is_some())
    }
    fn iterate_pools(&self) -> StoreResult<Vec<Pool>>;

    /// The staker book for a pool; empty book when none exists yet.
    fn get_pool_staker(&self, asset: &Asset) -> StoreResult<PoolStaker>;
    fn set_pool_staker(&self, staker: &PoolStaker) -> StoreResult<()>;

    /// One staker's record in one pool, if any.
    fn get_staker_units(
        &self,
        asset: &Asset,
        address: &Address,
    ) -> StoreResult<Option<crate::pool::StakerUnit>> {
        Ok(self.get_pool_staker(asset)?.get(address).cloned())
    }

    /// The inverse view: every pool this address has units in.
    fn get_staker_pools(&self, address: &Address) -> StoreResult<Vec<PoolStaker>> {
        Ok(self
            .iterate_pools()?
            .into_iter()
            .map(|p| self.get_pool_staker(&p.asset))
            .collect::<StoreResult<Vec<_>>>()?
            .into_iter()
            .filter(|book| book.get(address).is_some())
            .collect())
    }

    // =========================================================================
    // Vaults
    // =========================================================================

    fn get_vault(&self, pub_key: &PubKey) -> StoreResult<Option<Vault>>;
    fn set_vault(&self, vault: &Vault) -> StoreResult<()>;
    fn delete_vault(&self, pub_key: &PubKey) -> StoreResult<()>;
    fn get_vaults_by_status(
        &self,
        status: VaultStatus,
        kind: VaultKind,
    ) -> StoreResult<Vec<Vault>>;
    fn iterate_vaults(&self) -> StoreResult<Vec<Vault>>;

    // =========================================================================
    // Node accounts
    // =========================================================================

    fn get_node_account(&self, address: &Address) -> StoreResult<Option<NodeAccount>>;
    fn get_node_account_by_pubkey(&self, pub_key: &PubKey) -> StoreResult<Option<NodeAccount>>;
    fn set_node_account(&self, account: &NodeAccount) -> StoreResult<()>;
    fn list_active_nodes(&self) -> StoreResult<Vec<NodeAccount>>;
    fn iterate_node_accounts(&self) -> StoreResult<Vec<NodeAccount>>;

    // =========================================================================
    // Event log
    // =========================================================================

    /// Claim the next monotonic event id.
    fn next_event_id(&self) -> StoreResult<u64>;
    fn append_event(&self, event: &Event) -> StoreResult<()>;
    fn get_event(&self, id: u64) -> StoreResult<Option<Event>>;
    /// Latest still-pending event whose inbound tx id matches.
    fn get_pending_event_by_in_hash(&self, in_hash: &TxId) -> StoreResult<Option<Event>>;
    /// Overwrite an existing event (outbound reconciliation).
    fn update_event(&self, event: &Event) -> StoreResult<()>;
    fn iterate_events(&self) -> StoreResult<Vec<Event>>;

    // =========================================================================
    // Outbound queue
    // =========================================================================

    fn append_txout(&self, height: BlockHeight, item: &TxOutItem) -> StoreResult<()>;
    fn get_txout(&self, height: BlockHeight) -> StoreResult<Vec<TxOutItem>>;
    /// Replace the whole batch at `height` (completion, reaping).
    fn set_txout(&self, height: BlockHeight, items: &[TxOutItem]) -> StoreResult<()>;
    /// All queued batches in height order.
    fn iterate_txout(&self) -> StoreResult<Vec<(BlockHeight, Vec<TxOutItem>)>>;

    /// Every item still waiting on a signature, in queue order; the
    /// signer's retry worklist.
    fn get_txouts_for_retry(&self) -> StoreResult<Vec<TxOutItem>> {
        Ok(self
            .iterate_txout()?
            .into_iter()
            .flat_map(|(_, items)| items)
            .filter(|item| !item.is_signed())
            .collect())
    }

    // =========================================================================
    // Keygen schedule
    // =========================================================================

    fn set_keygens(&self, keygens: &Keygens) -> StoreResult<()>;
    fn get_keygens(&self, height: BlockHeight) -> StoreResult<Option<Keygens>>;
    fn delete_keygens(&self, height: BlockHeight) -> StoreResult<()>;
    fn iterate_keygens(&self) -> StoreResult<Vec<Keygens>>;

    // =========================================================================
    // Singletons
    // =========================================================================

    fn get_network_fee(&self, chain: &Chain) -> StoreResult<Option<Amount>>;
    fn set_network_fee(&self, chain: &Chain, fee: Amount) -> StoreResult<()>;

    fn get_reserve(&self) -> StoreResult<Amount>;
    fn set_reserve(&self, amount: Amount) -> StoreResult<()>;

    fn get_version(&self) -> StoreResult<u64>;
    fn set_version(&self, version: u64) -> StoreResult<()>;

    fn get_ragnarok_height(&self) -> StoreResult<Option<BlockHeight>>;
    fn set_ragnarok_height(&self, height: BlockHeight) -> StoreResult<()>;
}
