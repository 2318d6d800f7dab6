//! Coins: (asset, amount) pairs and multisets of them
//!
//! `Coins` keeps at most one entry per asset; `add`/`sub` merge by asset.
//! Subtraction saturates at zero: a vault can never be recorded as holding
//! a negative balance, and the callers that care about shortfalls check
//! `get` before mutating.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Amount, Asset};

/// A quantity of a single asset.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub asset: Asset,
    pub amount: Amount,
}

impl Coin {
    pub fn new(asset: Asset, amount: Amount) -> Self {
        Self { asset, amount }
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.asset)
    }
}

impl fmt::Debug for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coin({} {})", self.amount, self.asset)
    }
}

/// A set of coins, one entry per asset.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Coins(Vec<Coin>);

impl Coins {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_vec(mut coins: Vec<Coin>) -> Self {
        coins.retain(|c| !c.is_empty());
        let mut out = Self::new();
        for c in coins {
            out.add(&c.asset, c.amount);
        }
        out
    }

    /// Balance of `asset`, zero when absent.
    pub fn get(&self, asset: &Asset) -> Amount {
        self.0
            .iter()
            .find(|c| &c.asset == asset)
            .map(|c| c.amount)
            .unwrap_or(0)
    }

    /// Credit `amount` of `asset`, merging with an existing entry.
    pub fn add(&mut self, asset: &Asset, amount: Amount) {
        if amount == 0 {
            return;
        }
        match self.0.iter_mut().find(|c| &c.asset == asset) {
            Some(c) => c.amount = c.amount.saturating_add(amount),
            None => self.0.push(Coin::new(asset.clone(), amount)),
        }
        self.0.sort_by(|a, b| a.asset.cmp(&b.asset));
    }

    /// Debit up to `amount` of `asset`; entries that reach zero are pruned.
    pub fn sub(&mut self, asset: &Asset, amount: Amount) {
        if let Some(c) = self.0.iter_mut().find(|c| &c.asset == asset) {
            c.amount = c.amount.saturating_sub(amount);
        }
        self.0.retain(|c| !c.is_empty());
    }

    /// True when no asset has a positive balance.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Coin::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Coin> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<Coin> for Coins {
    fn from_iter<I: IntoIterator<Item = Coin>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(", "))
    }
}

impl fmt::Debug for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coins[{}]", self)
    }
}
