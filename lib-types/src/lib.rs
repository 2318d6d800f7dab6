//! Canonical Types for the Liquidity Network
//!
//! Every layer of the state machine speaks these types. They are designed
//! to be:
//! - Deterministically serializable (consensus state must encode identically
//!   on every node)
//! - Normalized at construction (case-insensitive identifiers are stored
//!   uppercase, so derived equality is canonical equality)
//! - Cheap to clone and compare

pub mod address;
pub mod asset;
pub mod coin;
pub mod primitives;
pub mod tx;

pub use address::Address;
pub use asset::{Asset, Chain};
pub use coin::{Coin, Coins};
pub use primitives::{Amount, BlockHeight, Bps, PubKey, TxId, MAX_BASIS_POINTS, ONE};
pub use tx::Tx;

/// Errors produced while constructing canonical types from wire strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("invalid chain identifier: {0}")]
    InvalidChain(String),

    #[error("invalid asset: {0}")]
    InvalidAsset(String),

    #[error("invalid address for chain {chain}: {reason}")]
    InvalidAddress { chain: String, reason: String },

    #[error("invalid tx id: {0}")]
    InvalidTxId(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

pub type TypeResult<T> = Result<T, TypeError>;
