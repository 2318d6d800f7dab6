//! Threshold-Signature Oracle Abstraction
//!
//! The core never runs cryptography. Key generation and transaction
//! signing happen in an external signer process; the state machine only
//! (a) schedules keygen ceremonies by persisting [`Keygens`] records that
//! signers watch for, and (b) abstracts the signer behind [`TssOracle`] so
//! hosts can wire in their own transport. Completions come back
//! asynchronously as consensus messages (`TssPool`, observed outbounds) -
//! nothing here blocks.

use serde::{Deserialize, Serialize};

use lib_types::{BlockHeight, PubKey};

/// Keygen ceremonies scheduled at one block height. Each group is the
/// member set of one prospective vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keygens {
    pub height: BlockHeight,
    pub groups: Vec<Vec<PubKey>>,
}

impl Keygens {
    pub fn new(height: BlockHeight) -> Self {
        Self { height, groups: Vec::new() }
    }

    /// Schedule a ceremony for `members`. Members are sorted so the record
    /// is deterministic regardless of discovery order.
    pub fn add_group(&mut self, mut members: Vec<PubKey>) {
        members.sort();
        members.dedup();
        if !members.is_empty() {
            self.groups.push(members);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Failure reported by the signer transport when a request cannot even be
/// submitted. Ceremony failures arrive later as `TssKeysignFail` messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tss oracle unavailable: {0}")]
pub struct TssUnavailable(pub String);

/// The signer subsystem as the core sees it: fire-and-forget requests
/// whose results are observed as later consensus messages.
pub trait TssOracle {
    /// Ask the signer fleet to run a keygen ceremony over `group`.
    fn request_keygen(&self, group: &[PubKey]) -> Result<(), TssUnavailable>;

    /// Ask the holder of `vault_pub_key` to sign `tx_bytes`.
    fn sign(&self, vault_pub_key: &PubKey, tx_bytes: &[u8]) -> Result<(), TssUnavailable>;
}
