//! Primitive Aliases and Identifier Newtypes
//!
//! Monetary values are unsigned 128-bit integers in a fixed base unit of
//! `10^8` per whole unit. All arithmetic on amounts must be checked or
//! saturating: an overflow is a state-machine invariant violation, never a
//! silent wraparound. Division rounds toward zero everywhere.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{TypeError, TypeResult};

// ============================================================================
// TYPE ALIASES
// ============================================================================

/// Monetary amount in base units (`10^8` per whole unit).
pub type Amount = u128;

/// One whole unit of any asset.
pub const ONE: Amount = 100_000_000;

/// Basis points (10_000 = 100%).
pub type Bps = u64;

/// Upper bound for basis-point fields.
pub const MAX_BASIS_POINTS: Bps = 10_000;

/// Block height in the host chain (1-indexed; genesis work runs at 1).
pub type BlockHeight = u64;

// ============================================================================
// TRANSACTION ID
// ============================================================================

/// External-chain transaction hash, stored as uppercase hex.
///
/// The blank id is a sentinel used by internally generated outbounds
/// (e.g. vault migration) that have no originating inbound transfer.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct TxId(String);

impl TxId {
    /// Parse a tx id from its wire form. Accepts 64 hex chars, any case.
    pub fn new(s: &str) -> TypeResult<Self> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidTxId(s.to_string()));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    /// Sentinel id for outbounds with no originating inbound.
    pub fn blank() -> Self {
        Self(String::new())
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = if self.0.len() >= 8 { &self.0[..8] } else { &self.0 };
        write!(f, "TxId({})", short)
    }
}

// ============================================================================
// PUBLIC KEY
// ============================================================================

/// Identifier of a threshold-held or node-held key.
///
/// The key material itself never enters consensus state; this is the opaque
/// handle the signing oracle hands back after a keygen ceremony. Chain
/// addresses are derived from it deterministically so that every node agrees
/// on which external address belongs to which vault.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct PubKey(String);

impl PubKey {
    pub fn new(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the deterministic external address this key controls on
    /// `chain`. Opaque but stable: every node derives the same address.
    pub fn derive_address(&self, chain: &crate::Chain) -> crate::Address {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.0.as_bytes());
        hasher.update(b"/");
        hasher.update(chain.as_str().as_bytes());
        let digest = hasher.finalize();
        crate::Address::unchecked(&hex::encode(&digest.as_bytes()[..20]))
    }
}

impl fmt::Display for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = if self.0.len() >= 8 { &self.0[..8] } else { &self.0 };
        write!(f, "PubKey({})", short)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Chain;

    #[test]
    fn tx_id_normalizes_to_uppercase() {
        let id = TxId::new(&"ab".repeat(32)).unwrap();
        assert_eq!(id.as_str(), "AB".repeat(32));
    }

    #[test]
    fn tx_id_rejects_bad_input() {
        assert!(TxId::new("short").is_err());
        assert!(TxId::new(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn blank_tx_id_is_sentinel() {
        assert!(TxId::blank().is_blank());
        assert!(!TxId::new(&"00".repeat(32)).unwrap().is_blank());
    }

    #[test]
    fn serialization_round_trips() {
        let id = TxId::new(&"0f".repeat(32)).unwrap();
        let bytes = bincode::serialize(&id).unwrap();
        let back: TxId = bincode::deserialize(&bytes).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn derived_addresses_are_stable_and_chain_scoped() {
        let pk = PubKey::new("vaultpubkey1");
        let bnb = Chain::new("BNB").unwrap();
        let btc = Chain::new("BTC").unwrap();
        assert_eq!(pk.derive_address(&bnb), pk.derive_address(&bnb));
        assert_ne!(pk.derive_address(&bnb), pk.derive_address(&btc));
    }
}
