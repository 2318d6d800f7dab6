//! Chain-Tagged Addresses
//!
//! Addresses are opaque strings owned by their external chain; the state
//! machine only validates shape, never checksums. The empty address is a
//! sentinel meaning "the sender of the inbound transfer" and is resolved at
//! execution time, never persisted as a destination.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Chain, TypeError, TypeResult};

/// An external-chain account address.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Address(String);

impl Address {
    /// Parse and shape-check an address for `chain`.
    ///
    /// Addresses never contain colons (the memo field separator) and are
    /// bounded in length; beyond that each chain's charset is its own
    /// business and full verification happens on the owning chain.
    pub fn new(chain: &Chain, s: &str) -> TypeResult<Self> {
        let reason = if s.is_empty() {
            Some("empty")
        } else if s.len() < 8 || s.len() > 90 {
            Some("length out of range")
        } else if !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            Some("invalid character")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(TypeError::InvalidAddress {
                chain: chain.to_string(),
                reason: reason.to_string(),
            });
        }
        Ok(Self(s.to_string()))
    }

    /// Construct without validation. For internally derived addresses
    /// (vault keys) whose shape is already canonical.
    pub fn unchecked(s: &str) -> Self {
        Self(s.to_string())
    }

    /// The "send back to sender" sentinel.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}
