//! Liquidity Pools and Staker Records
//!
//! Each pool pairs the native settlement asset RUNE against exactly one
//! external asset. Pool units are the fungible shares of a pool; the sum of
//! all staker units must always equal the pool's `pool_units`.
//!
//! # Invariants
//!
//! ## Invariant P1: Unit Conservation
//! `pool.pool_units == Σ staker.units` after every block.
//!
//! ## Invariant P2: Balanced Emptiness
//! If `pool_units == 0` then both balances are zero; while `pool_units > 0`
//! the two balances are either both zero or both positive.
//!
//! ## Invariant P3: No Negative Balances
//! Swaps and withdrawals that would drain a side below zero are rejected,
//! never clamped.

pub mod math;

use serde::{Deserialize, Serialize};
use std::fmt;

use lib_types::{Address, Amount, Asset};

/// Lifecycle status of a pool.
///
/// `Enabled ⇄ Bootstrap` by admin toggle (bootstrap pools accept stakes but
/// not swaps); `Suspended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolStatus {
    Enabled,
    Bootstrap,
    Suspended,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolStatus::Enabled => f.write_str("Enabled"),
            PoolStatus::Bootstrap => f.write_str("Bootstrap"),
            PoolStatus::Suspended => f.write_str("Suspended"),
        }
    }
}

/// A constant-product liquidity pool: RUNE against one external asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub asset: Asset,
    pub balance_rune: Amount,
    pub balance_asset: Amount,
    pub pool_units: Amount,
    pub status: PoolStatus,
    /// External-chain address inbound funds for this pool arrive at
    /// (the active asgard's address on the asset's chain).
    pub vault_address: Address,
}

impl Pool {
    /// A brand-new pool for `asset`. New pools start in `Bootstrap`:
    /// they take stakes but no swaps until an admin lists them.
    pub fn new(asset: Asset) -> Self {
        Self {
            asset,
            balance_rune: 0,
            balance_asset: 0,
            pool_units: 0,
            status: PoolStatus::Bootstrap,
            vault_address: Address::empty(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.status == PoolStatus::Enabled
    }

    /// Whether the pool can price a trade at all.
    pub fn has_liquidity(&self) -> bool {
        self.balance_rune > 0 && self.balance_asset > 0
    }

    /// Value `amount` of the pool's asset in RUNE at the spot price
    /// (rounds toward zero). Zero when the pool cannot price.
    pub fn asset_value_in_rune(&self, amount: Amount) -> Amount {
        if self.balance_asset == 0 {
            return 0;
        }
        amount
            .saturating_mul(self.balance_rune)
            .checked_div(self.balance_asset)
            .unwrap_or(0)
    }

    /// Value `amount` of RUNE in the pool's asset at the spot price
    /// (rounds toward zero). Zero when the pool cannot price.
    pub fn rune_value_in_asset(&self, amount: Amount) -> Amount {
        if self.balance_rune == 0 {
            return 0;
        }
        amount
            .saturating_mul(self.balance_asset)
            .checked_div(self.balance_rune)
            .unwrap_or(0)
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rune={} asset={} units={} {}",
            self.asset, self.balance_rune, self.balance_asset, self.pool_units, self.status
        )
    }
}

/// One staker's stake in one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerUnit {
    pub address: Address,
    pub units: Amount,
    /// Coins observed on one chain while the matching half of a cross-chain
    /// stake is still in flight.
    pub pending_rune: Amount,
    pub pending_asset: Amount,
}

impl StakerUnit {
    pub fn new(address: Address) -> Self {
        Self { address, units: 0, pending_rune: 0, pending_asset: 0 }
    }
}

/// All stakers of one pool, plus the unit total the pool must agree with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStaker {
    pub asset: Asset,
    pub total_units: Amount,
    pub stakers: Vec<StakerUnit>,
}

impl PoolStaker {
    pub fn new(asset: Asset) -> Self {
        Self { asset, total_units: 0, stakers: Vec::new() }
    }

    pub fn get(&self, address: &Address) -> Option<&StakerUnit> {
        self.stakers.iter().find(|s| &s.address == address)
    }

    /// Fetch-or-create the record for `address`.
    pub fn entry(&mut self, address: &Address) -> &mut StakerUnit {
        let idx = match self.stakers.iter().position(|s| &s.address == address) {
            Some(idx) => idx,
            None => {
                self.stakers.push(StakerUnit::new(address.clone()));
                self.stakers.len() - 1
            }
        };
        &mut self.stakers[idx]
    }

    /// Drop records whose units have reached zero.
    pub fn prune(&mut self) {
        self.stakers
            .retain(|s| s.units > 0 || s.pending_rune > 0 || s.pending_asset > 0);
    }

    pub fn len(&self) -> usize {
        self.stakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stakers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::ONE;

    fn bnb_pool() -> Pool {
        let mut p = Pool::new(Asset::new("BNB.BNB").unwrap());
        p.balance_rune = 200 * ONE;
        p.balance_asset = 100 * ONE;
        p.pool_units = 100 * ONE;
        p
    }

    #[test]
    fn spot_pricing_rounds_toward_zero() {
        let p = bnb_pool();
        // 1 BNB is worth 2 RUNE at this depth.
        assert_eq!(p.asset_value_in_rune(ONE), 2 * ONE);
        assert_eq!(p.rune_value_in_asset(2 * ONE), ONE);
        assert_eq!(p.asset_value_in_rune(1), 2);
        assert_eq!(p.rune_value_in_asset(1), 0);
    }

    #[test]
    fn empty_pool_prices_nothing() {
        let p = Pool::new(Asset::new("BNB.BNB").unwrap());
        assert!(!p.has_liquidity());
        assert_eq!(p.asset_value_in_rune(ONE), 0);
        assert_eq!(p.rune_value_in_asset(ONE), 0);
    }

    #[test]
    fn staker_entry_and_prune() {
        let mut ps = PoolStaker::new(Asset::new("BNB.BNB").unwrap());
        let addr = Address::unchecked("bnb1stakeraddress");
        ps.entry(&addr).units = 5;
        assert_eq!(ps.len(), 1);
        ps.entry(&addr).units = 0;
        ps.prune();
        assert!(ps.is_empty());
    }
}
