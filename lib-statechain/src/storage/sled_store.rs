//! Sled-Backed Keeper
//!
//! One ordered tree holds the whole state, laid out by the prefixes in
//! [`super::keys`]. Block transactions buffer writes in an ordered overlay:
//! reads consult the overlay first (read-your-writes inside a block), and
//! `commit_block` applies the overlay to sled as a single batch so a block
//! either lands whole or not at all.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::Path;
use std::sync::Mutex;

use lib_types::{Address, Amount, Asset, BlockHeight, Chain, PubKey, TxId};

use super::{keys, Keeper, StoreError, StoreResult};
use crate::events::{Event, EventStatus};
use crate::node_account::{NodeAccount, NodeStatus};
use crate::pool::{Pool, PoolStaker};
use crate::tss::Keygens;
use crate::txout::TxOutItem;
use crate::vault::{Vault, VaultKind, VaultStatus};

/// Writes buffered for the block currently being executed.
///
/// `None` marks a deletion; the overlay is ordered so prefix scans can
/// merge it with committed state.
struct BlockTx {
    height: BlockHeight,
    overlay: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

/// The production [`Keeper`].
pub struct SledKeeper {
    _db: sled::Db,
    tree: sled::Tree,
    tx: Mutex<Option<BlockTx>>,
}

impl std::fmt::Debug for SledKeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledKeeper").finish_non_exhaustive()
    }
}

const TREE_STATE: &str = "state";

impl SledKeeper {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path).map_err(|e| StoreError::database("open", "db", e))?;
        Self::with_db(db)
    }

    /// Open a throwaway in-memory store (tests).
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::database("open", "db", e))?;
        Self::with_db(db)
    }

    fn with_db(db: sled::Db) -> StoreResult<Self> {
        let tree = db
            .open_tree(TREE_STATE)
            .map_err(|e| StoreError::database("open", TREE_STATE, e))?;
        Ok(Self { _db: db, tree, tx: Mutex::new(None) })
    }

    fn lock_tx(&self) -> StoreResult<std::sync::MutexGuard<'_, Option<BlockTx>>> {
        self.tx
            .lock()
            .map_err(|e| StoreError::database("lock", "tx", e))
    }

    fn serialize<T: serde::Serialize>(op: &'static str, key: &[u8], value: &T) -> StoreResult<Vec<u8>> {
        bincode::serialize(value)
            .map_err(|e| StoreError::corrupted(op, String::from_utf8_lossy(key).into_owned(), e))
    }

    fn deserialize<T: serde::de::DeserializeOwned>(
        op: &'static str,
        key: &[u8],
        bytes: &[u8],
    ) -> StoreResult<T> {
        bincode::deserialize(bytes)
            .map_err(|e| StoreError::corrupted(op, String::from_utf8_lossy(key).into_owned(), e))
    }

    /// Read through the overlay, then committed state.
    fn get_raw(&self, op: &'static str, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        if let Some(tx) = self.lock_tx()?.as_ref() {
            if let Some(buffered) = tx.overlay.get(key) {
                return Ok(buffered.clone());
            }
        }
        self.tree
            .get(key)
            .map(|v| v.map(|ivec| ivec.to_vec()))
            .map_err(|e| StoreError::database(op, String::from_utf8_lossy(key).into_owned(), e))
    }

    /// Buffer a write; only legal inside a block transaction.
    fn put_raw(&self, key: Vec<u8>, value: Vec<u8>) -> StoreResult<()> {
        let mut guard = self.lock_tx()?;
        let tx = guard.as_mut().ok_or(StoreError::NoActiveTransaction)?;
        tx.overlay.insert(key, Some(value));
        Ok(())
    }

    /// Buffer a deletion; only legal inside a block transaction.
    fn del_raw(&self, key: Vec<u8>) -> StoreResult<()> {
        let mut guard = self.lock_tx()?;
        let tx = guard.as_mut().ok_or(StoreError::NoActiveTransaction)?;
        tx.overlay.insert(key, None);
        Ok(())
    }

    /// All live `(key, value)` pairs under `prefix`, committed state merged
    /// with the overlay (overlay wins; buffered deletions hide entries).
    fn scan_prefix(&self, op: &'static str, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for entry in self.tree.scan_prefix(prefix) {
            let (key, value) = entry.map_err(|e| {
                StoreError::database(op, String::from_utf8_lossy(prefix).into_owned(), e)
            })?;
            merged.insert(key.to_vec(), value.to_vec());
        }
        if let Some(tx) = self.lock_tx()?.as_ref() {
            let range = tx
                .overlay
                .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
                .take_while(|(k, _)| k.starts_with(prefix));
            for (key, value) in range {
                match value {
                    Some(v) => {
                        merged.insert(key.clone(), v.clone());
                    }
                    None => {
                        merged.remove(key);
                    }
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    fn get_typed<T: serde::de::DeserializeOwned>(
        &self,
        op: &'static str,
        key: &[u8],
    ) -> StoreResult<Option<T>> {
        match self.get_raw(op, key)? {
            Some(bytes) => Ok(Some(Self::deserialize(op, key, &bytes)?)),
            None => Ok(None),
        }
    }

    fn put_typed<T: serde::Serialize>(
        &self,
        op: &'static str,
        key: Vec<u8>,
        value: &T,
    ) -> StoreResult<()> {
        let bytes = Self::serialize(op, &key, value)?;
        self.put_raw(key, bytes)
    }
}

impl Keeper for SledKeeper {
    // =========================================================================
    // Block transaction lifecycle
    // =========================================================================

    fn begin_block(&self, height: BlockHeight) -> StoreResult<()> {
        let mut guard = self.lock_tx()?;
        if guard.is_some() {
            return Err(StoreError::database(
                "begin_block",
                "tx",
                "a block transaction is already active",
            ));
        }
        *guard = Some(BlockTx { height, overlay: BTreeMap::new() });
        Ok(())
    }

    fn commit_block(&self) -> StoreResult<()> {
        let mut guard = self.lock_tx()?;
        let tx = guard.take().ok_or(StoreError::NoActiveTransaction)?;
        let mut batch = sled::Batch::default();
        for (key, value) in tx.overlay {
            match value {
                Some(v) => batch.insert(key, v),
                None => batch.remove(key),
            }
        }
        batch.insert(keys::meta::LATEST_HEIGHT.to_vec(), tx.height.to_be_bytes().to_vec());
        self.tree
            .apply_batch(batch)
            .map_err(|e| StoreError::database("commit_block", "tx", e))?;
        self.tree
            .flush()
            .map_err(|e| StoreError::database("commit_block", "flush", e))?;
        Ok(())
    }

    fn rollback_block(&self) -> StoreResult<()> {
        let mut guard = self.lock_tx()?;
        guard.take().ok_or(StoreError::NoActiveTransaction)?;
        Ok(())
    }

    fn current_height(&self) -> StoreResult<BlockHeight> {
        let guard = self.lock_tx()?;
        guard
            .as_ref()
            .map(|tx| tx.height)
            .ok_or(StoreError::NoActiveTransaction)
    }

    // =========================================================================
    // Pools and stakers
    // =========================================================================

    fn get_pool(&self, asset: &Asset) -> StoreResult<Option<Pool>> {
        self.get_typed("get_pool", &keys::pool_key(asset))
    }

    fn set_pool(&self, pool: &Pool) -> StoreResult<()> {
        self.put_typed("set_pool", keys::pool_key(&pool.asset), pool)
    }

    fn iterate_pools(&self) -> StoreResult<Vec<Pool>> {
        self.scan_prefix("iterate_pools", keys::POOL_PREFIX)?
            .iter()
            .map(|(k, v)| Self::deserialize("iterate_pools", k, v))
            .collect()
    }

    fn get_pool_staker(&self, asset: &Asset) -> StoreResult<PoolStaker> {
        Ok(self
            .get_typed("get_pool_staker", &keys::pool_staker_key(asset))?
            .unwrap_or_else(|| PoolStaker::new(asset.clone())))
    }

    fn set_pool_staker(&self, staker: &PoolStaker) -> StoreResult<()> {
        self.put_typed(
            "set_pool_staker",
            keys::pool_staker_key(&staker.asset),
            staker,
        )
    }

    // =========================================================================
    // Vaults
    // =========================================================================

    fn get_vault(&self, pub_key: &PubKey) -> StoreResult<Option<Vault>> {
        self.get_typed("get_vault", &keys::vault_key(pub_key))
    }

    fn set_vault(&self, vault: &Vault) -> StoreResult<()> {
        self.put_typed("set_vault", keys::vault_key(&vault.pub_key), vault)
    }

    fn delete_vault(&self, pub_key: &PubKey) -> StoreResult<()> {
        self.del_raw(keys::vault_key(pub_key))
    }

    fn get_vaults_by_status(
        &self,
        status: VaultStatus,
        kind: VaultKind,
    ) -> StoreResult<Vec<Vault>> {
        Ok(self
            .iterate_vaults()?
            .into_iter()
            .filter(|v| v.status == status && v.kind == kind)
            .collect())
    }

    fn iterate_vaults(&self) -> StoreResult<Vec<Vault>> {
        self.scan_prefix("iterate_vaults", keys::VAULT_PREFIX)?
            .iter()
            .map(|(k, v)| Self::deserialize("iterate_vaults", k, v))
            .collect()
    }

    // =========================================================================
    // Node accounts
    // =========================================================================

    fn get_node_account(&self, address: &Address) -> StoreResult<Option<NodeAccount>> {
        self.get_typed("get_node_account", &keys::node_account_key(address))
    }

    fn get_node_account_by_pubkey(&self, pub_key: &PubKey) -> StoreResult<Option<NodeAccount>> {
        Ok(self
            .iterate_node_accounts()?
            .into_iter()
            .find(|na| &na.pub_key == pub_key))
    }

    fn set_node_account(&self, account: &NodeAccount) -> StoreResult<()> {
        self.put_typed(
            "set_node_account",
            keys::node_account_key(&account.node_address),
            account,
        )
    }

    fn list_active_nodes(&self) -> StoreResult<Vec<NodeAccount>> {
        Ok(self
            .iterate_node_accounts()?
            .into_iter()
            .filter(|na| na.status == NodeStatus::Active)
            .collect())
    }

    fn iterate_node_accounts(&self) -> StoreResult<Vec<NodeAccount>> {
        self.scan_prefix("iterate_node_accounts", keys::NODE_ACCOUNT_PREFIX)?
            .iter()
            .map(|(k, v)| Self::deserialize("iterate_node_accounts", k, v))
            .collect()
    }

    // =========================================================================
    // Event log
    // =========================================================================

    fn next_event_id(&self) -> StoreResult<u64> {
        let current = match self.get_raw("next_event_id", keys::meta::EVENT_SEQ)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    StoreError::corrupted("next_event_id", "meta/event_seq", "bad length")
                })?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        let next = current + 1;
        self.put_raw(keys::meta::EVENT_SEQ.to_vec(), next.to_be_bytes().to_vec())?;
        Ok(next)
    }

    fn append_event(&self, event: &Event) -> StoreResult<()> {
        self.put_typed("append_event", keys::event_key(event.id), event)
    }

    fn get_event(&self, id: u64) -> StoreResult<Option<Event>> {
        self.get_typed("get_event", &keys::event_key(id))
    }

    fn get_pending_event_by_in_hash(&self, in_hash: &TxId) -> StoreResult<Option<Event>> {
        Ok(self
            .iterate_events()?
            .into_iter()
            .filter(|e| e.status == EventStatus::Pending && &e.in_tx.id == in_hash)
            .next_back())
    }

    fn update_event(&self, event: &Event) -> StoreResult<()> {
        self.put_typed("update_event", keys::event_key(event.id), event)
    }

    fn iterate_events(&self) -> StoreResult<Vec<Event>> {
        self.scan_prefix("iterate_events", keys::EVENT_PREFIX)?
            .iter()
            .map(|(k, v)| Self::deserialize("iterate_events", k, v))
            .collect()
    }

    // =========================================================================
    // Outbound queue
    // =========================================================================

    fn append_txout(&self, height: BlockHeight, item: &TxOutItem) -> StoreResult<()> {
        let mut items = self.get_txout(height)?;
        items.push(item.clone());
        self.set_txout(height, &items)
    }

    fn get_txout(&self, height: BlockHeight) -> StoreResult<Vec<TxOutItem>> {
        Ok(self
            .get_typed("get_txout", &keys::txout_key(height))?
            .unwrap_or_default())
    }

    fn set_txout(&self, height: BlockHeight, items: &[TxOutItem]) -> StoreResult<()> {
        if items.is_empty() {
            return self.del_raw(keys::txout_key(height));
        }
        self.put_typed("set_txout", keys::txout_key(height), &items.to_vec())
    }

    fn iterate_txout(&self) -> StoreResult<Vec<(BlockHeight, Vec<TxOutItem>)>> {
        let mut out = Vec::new();
        for (key, value) in self.scan_prefix("iterate_txout", keys::TXOUT_PREFIX)? {
            let height = keys::parse_txout_key(&key).ok_or_else(|| {
                StoreError::corrupted(
                    "iterate_txout",
                    String::from_utf8_lossy(&key).into_owned(),
                    "unparseable height",
                )
            })?;
            out.push((height, Self::deserialize("iterate_txout", &key, &value)?));
        }
        Ok(out)
    }

    // =========================================================================
    // Keygen schedule
    // =========================================================================

    fn set_keygens(&self, keygens: &Keygens) -> StoreResult<()> {
        self.put_typed("set_keygens", keys::keygen_key(keygens.height), keygens)
    }

    fn get_keygens(&self, height: BlockHeight) -> StoreResult<Option<Keygens>> {
        self.get_typed("get_keygens", &keys::keygen_key(height))
    }

    fn delete_keygens(&self, height: BlockHeight) -> StoreResult<()> {
        self.del_raw(keys::keygen_key(height))
    }

    fn iterate_keygens(&self) -> StoreResult<Vec<Keygens>> {
        self.scan_prefix("iterate_keygens", keys::KEYGEN_PREFIX)?
            .iter()
            .map(|(k, v)| Self::deserialize("iterate_keygens", k, v))
            .collect()
    }

    // =========================================================================
    // Singletons
    // =========================================================================

    fn get_network_fee(&self, chain: &Chain) -> StoreResult<Option<Amount>> {
        self.get_typed("get_network_fee", &keys::network_fee_key(chain))
    }

    fn set_network_fee(&self, chain: &Chain, fee: Amount) -> StoreResult<()> {
        self.put_typed("set_network_fee", keys::network_fee_key(chain), &fee)
    }

    fn get_reserve(&self) -> StoreResult<Amount> {
        Ok(self
            .get_typed("get_reserve", keys::meta::RESERVE)?
            .unwrap_or(0))
    }

    fn set_reserve(&self, amount: Amount) -> StoreResult<()> {
        self.put_typed("set_reserve", keys::meta::RESERVE.to_vec(), &amount)
    }

    fn get_version(&self) -> StoreResult<u64> {
        Ok(self
            .get_typed("get_version", keys::meta::VERSION)?
            .unwrap_or(crate::constants::CURRENT_VERSION))
    }

    fn set_version(&self, version: u64) -> StoreResult<()> {
        self.put_typed("set_version", keys::meta::VERSION.to_vec(), &version)
    }

    fn get_ragnarok_height(&self) -> StoreResult<Option<BlockHeight>> {
        self.get_typed("get_ragnarok_height", keys::meta::RAGNAROK_HEIGHT)
    }

    fn set_ragnarok_height(&self, height: BlockHeight) -> StoreResult<()> {
        self.put_typed(
            "set_ragnarok_height",
            keys::meta::RAGNAROK_HEIGHT.to_vec(),
            &height,
        )
    }
}
