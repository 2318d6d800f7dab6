//! Handler Error Taxonomy
//!
//! Errors fall into the classes the host consensus engine cares about:
//!
//! - `Validation`: the message is well-signed but wrong (bad memo, missing
//!   pool, slip breach, ...). If funds were already received the handler
//!   refunds them minus gas; the block continues.
//! - `Unauthorized`: signer is not in the Active node set. The message is
//!   dropped; nothing is refunded because nothing was accepted.
//! - `BadVersion`: no handler variant for the current protocol version.
//! - `InvariantViolation`: accounting is broken (negative pool balance,
//!   unit mismatch, store corruption). Fatal: the block aborts and the
//!   failure surfaces to the consensus engine.
//! - `Store`: the keyed store failed; treated as fatal like an invariant
//!   violation.

use thiserror::Error;

use crate::storage::StoreError;

/// Numeric codes attached to refund events so downstream indexers can
/// classify failures without parsing reason strings.
pub mod codes {
    pub const MALFORMED_MEMO: u32 = 101;
    pub const UNKNOWN_ASSET: u32 = 102;
    pub const MISSING_POOL: u32 = 103;
    pub const SWAP_FAIL_SLIP: u32 = 104;
    pub const STAKE_TOO_SMALL: u32 = 105;
    pub const INSUFFICIENT_FUNDS: u32 = 106;
    pub const INSUFFICIENT_LIQUIDITY: u32 = 107;
    pub const INVALID_BASIS_POINTS: u32 = 108;
    pub const SIGNING_TIMEOUT: u32 = 109;
    pub const POOL_DISABLED: u32 = 110;
    pub const INVALID_MESSAGE: u32 = 111;
}

/// Error returned by message handlers and the dispatch engine.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("validation failed (code {code}): {reason}")]
    Validation { code: u32, reason: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("no handler for protocol version {version}")]
    BadVersion { version: u64 },

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl HandlerError {
    /// Shorthand for a refundable validation failure.
    pub fn validation(code: u32, reason: impl Into<String>) -> Self {
        Self::Validation { code, reason: reason.into() }
    }

    /// Whether a handler rejecting with this error should refund funds it
    /// has already received.
    pub fn is_refundable(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Whether the host must abort the whole block.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_) | Self::Store(_))
    }

    /// The numeric code carried into refund events.
    pub fn code(&self) -> u32 {
        match self {
            Self::Validation { code, .. } => *code,
            _ => codes::INVALID_MESSAGE,
        }
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_refundable_and_not_fatal() {
        let err = HandlerError::validation(codes::MISSING_POOL, "no pool");
        assert!(err.is_refundable());
        assert!(!err.is_fatal());
        assert_eq!(err.code(), codes::MISSING_POOL);
    }

    #[test]
    fn store_errors_are_fatal() {
        let err = HandlerError::from(StoreError::corrupted("get", "pool/BNB.BNB", "bad bytes"));
        assert!(err.is_fatal());
        assert!(!err.is_refundable());
    }
}
