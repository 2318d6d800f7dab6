//! Version-Gated Network Constants
//!
//! Consensus-critical tuning values, keyed by protocol version. Handlers
//! receive the table for the version currently recorded in state; they
//! never read configuration from process-wide globals, so replaying old
//! blocks under an old version reproduces old behavior bit-for-bit.

use lib_types::{Amount, Bps, Chain, ONE};

/// Protocol version this build understands natively.
pub const CURRENT_VERSION: u64 = 1;

/// The per-version constants table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constants {
    /// Blocks between staged fund-migration rounds for retiring vaults.
    pub fund_migration_interval: u64,
    /// Blocks an outbound item may stay unsigned before it is reaped and
    /// refunded.
    pub signing_transaction_period: u64,
    /// Upper bound for unstake basis points.
    pub max_unstake_basis_points: Bps,
    /// Smallest bond that creates a node account.
    pub minimum_bond_in_rune: Amount,
    /// Staker-count interval at which the minimum-stake threshold ratchets
    /// up (no minimum at all below 100 stakers).
    pub stake_amount_interval: u64,
    /// Reserve emission distributed per block across bonds and pools.
    pub block_emission: Amount,
    /// Slash points booked against each node blamed for a keysign failure.
    pub keysign_fail_slash_points: u64,
}

impl Constants {
    /// Constants for `version`, or `None` when this build has no handler
    /// set for that version (the dispatch engine maps that to a version
    /// error, never a fallback).
    pub fn for_version(version: u64) -> Option<&'static Constants> {
        match version {
            1 => Some(&V1),
            _ => None,
        }
    }

    /// Default expected network fee for outbounds on `chain`, in the
    /// chain's own gas asset base units. Observed fee reports override
    /// these defaults at runtime.
    pub fn default_outbound_gas_fee(&self, chain: &Chain) -> Amount {
        match chain.as_str() {
            "BNB" => 37_500,
            "BTC" => 10_000,
            "ETH" => 120_000,
            _ => 100_000,
        }
    }
}

static V1: Constants = Constants {
    fund_migration_interval: 360,
    signing_transaction_period: 300,
    max_unstake_basis_points: 10_000,
    minimum_bond_in_rune: 1_000 * ONE,
    stake_amount_interval: 100,
    block_emission: 2 * ONE,
    keysign_fail_slash_points: 2,
};
