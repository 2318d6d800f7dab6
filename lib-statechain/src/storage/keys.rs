//! Key Encoding
//!
//! Key encoding is protocol: every node must lay state out identically for
//! state hashes to agree. Never inline key construction in business logic.
//!
//! Layout (`<prefix>/<identifier>`):
//!
//! - `pool/<asset>` → Pool
//! - `poolstaker/<asset>` → PoolStaker
//! - `vault/<pubkey>` → Vault
//! - `nodeaccount/<address>` → NodeAccount
//! - `event/<id BE u64>` → Event
//! - `txout/<height BE u64>` → Vec<TxOutItem>
//! - `keygen/<height BE u64>` → Keygens
//! - `networkfee/<chain>` → Amount
//! - `meta/...` → counters and singletons
//!
//! Numeric identifiers are big-endian so lexicographic key order is
//! numeric order and range scans walk heights/ids in sequence.

use lib_types::{Address, Asset, BlockHeight, Chain, PubKey};

pub const POOL_PREFIX: &[u8] = b"pool/";
pub const POOL_STAKER_PREFIX: &[u8] = b"poolstaker/";
pub const VAULT_PREFIX: &[u8] = b"vault/";
pub const NODE_ACCOUNT_PREFIX: &[u8] = b"nodeaccount/";
pub const EVENT_PREFIX: &[u8] = b"event/";
pub const TXOUT_PREFIX: &[u8] = b"txout/";
pub const KEYGEN_PREFIX: &[u8] = b"keygen/";
pub const NETWORK_FEE_PREFIX: &[u8] = b"networkfee/";

pub mod meta {
    pub const VERSION: &[u8] = b"meta/version";
    pub const RESERVE: &[u8] = b"meta/reserve";
    pub const EVENT_SEQ: &[u8] = b"meta/event_seq";
    pub const RAGNAROK_HEIGHT: &[u8] = b"meta/ragnarok_height";
    pub const LATEST_HEIGHT: &[u8] = b"meta/latest_height";
}

fn join(prefix: &[u8], id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + id.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(id);
    key
}

#[inline]
pub fn pool_key(asset: &Asset) -> Vec<u8> {
    join(POOL_PREFIX, asset.to_string().as_bytes())
}

#[inline]
pub fn pool_staker_key(asset: &Asset) -> Vec<u8> {
    join(POOL_STAKER_PREFIX, asset.to_string().as_bytes())
}

#[inline]
pub fn vault_key(pub_key: &PubKey) -> Vec<u8> {
    join(VAULT_PREFIX, pub_key.as_str().as_bytes())
}

#[inline]
pub fn node_account_key(address: &Address) -> Vec<u8> {
    join(NODE_ACCOUNT_PREFIX, address.as_str().as_bytes())
}

#[inline]
pub fn event_key(id: u64) -> Vec<u8> {
    join(EVENT_PREFIX, &id.to_be_bytes())
}

#[inline]
pub fn txout_key(height: BlockHeight) -> Vec<u8> {
    join(TXOUT_PREFIX, &height.to_be_bytes())
}

/// Parse the height back out of a txout key (for range scans).
pub fn parse_txout_key(key: &[u8]) -> Option<BlockHeight> {
    let rest = key.strip_prefix(TXOUT_PREFIX)?;
    let bytes: [u8; 8] = rest.try_into().ok()?;
    Some(BlockHeight::from_be_bytes(bytes))
}

#[inline]
pub fn keygen_key(height: BlockHeight) -> Vec<u8> {
    join(KEYGEN_PREFIX, &height.to_be_bytes())
}

#[inline]
pub fn network_fee_key(chain: &Chain) -> Vec<u8> {
    join(NETWORK_FEE_PREFIX, chain.as_str().as_bytes())
}
