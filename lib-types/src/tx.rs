//! Observed Transfer Envelope
//!
//! The shape in which chain observers report external transfers to the
//! state machine: who paid whom, on which chain, which coins, what gas the
//! transfer burned, and the opaque memo string carrying the intent.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Address, Chain, Coins, TxId};

/// An external-chain transfer as reported by an observer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub id: TxId,
    pub chain: Chain,
    pub from_address: Address,
    pub to_address: Address,
    pub coins: Coins,
    pub gas: Coins,
    pub memo: String,
}

impl Tx {
    pub fn new(
        id: TxId,
        chain: Chain,
        from_address: Address,
        to_address: Address,
        coins: Coins,
        gas: Coins,
        memo: String,
    ) -> Self {
        Self { id, chain, from_address, to_address, coins, gas, memo }
    }

    /// True when the envelope is plausible: a real id, a sender, and at
    /// least one coin. Observers should never hand us anything else.
    pub fn is_valid(&self) -> bool {
        !self.id.is_blank() && !self.from_address.is_empty() && !self.coins.is_empty()
    }
}

impl fmt::Display for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} ({}) memo={:?}",
            self.id, self.from_address, self.to_address, self.coins, self.memo
        )
    }
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tx({})", self)
    }
}
