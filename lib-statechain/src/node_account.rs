//! Node Accounts
//!
//! A node account is a validator operator's standing in the network:
//! its bond (collateral), the keys it signs with, and where it is in the
//! membership lifecycle.
//!
//! Lifecycle: `WhiteListed → Standby → Ready → Active`, with `Disabled`
//! for operators forced out. A node that asks to leave is demoted to
//! Standby and keeps `requested_to_leave` set until its yggdrasil vault is
//! drained and its bond refunded.

use serde::{Deserialize, Serialize};
use std::fmt;

use lib_types::{Address, Amount, BlockHeight, PubKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    WhiteListed,
    Standby,
    Ready,
    Active,
    Disabled,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::WhiteListed => f.write_str("WhiteListed"),
            NodeStatus::Standby => f.write_str("Standby"),
            NodeStatus::Ready => f.write_str("Ready"),
            NodeStatus::Active => f.write_str("Active"),
            NodeStatus::Disabled => f.write_str("Disabled"),
        }
    }
}

/// A validator operator's consensus-side record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAccount {
    /// Native-chain address identifying the operator.
    pub node_address: Address,
    /// Key the operator's validator signs consensus with.
    pub validator_consensus_pub_key: PubKey,
    /// Key the operator's signer daemon holds (owns the yggdrasil vault).
    pub pub_key: PubKey,
    /// Vault keys this node is a threshold member of.
    pub signer_membership: Vec<PubKey>,
    pub status: NodeStatus,
    pub bond: Amount,
    /// Address the bond was paid from; refunds go back there.
    pub bond_address: Address,
    pub requested_to_leave: bool,
    pub status_since: BlockHeight,
    /// Operational misbehavior counter (failed keysigns etc.); read by
    /// operators, not by consensus.
    pub slash_points: u64,
}

impl NodeAccount {
    pub fn new(node_address: Address, pub_key: PubKey, height: BlockHeight) -> Self {
        Self {
            node_address,
            validator_consensus_pub_key: PubKey::empty(),
            pub_key,
            signer_membership: Vec::new(),
            status: NodeStatus::WhiteListed,
            bond: 0,
            bond_address: Address::empty(),
            requested_to_leave: false,
            status_since: height,
            slash_points: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }

    pub fn update_status(&mut self, status: NodeStatus, height: BlockHeight) {
        self.status = status;
        self.status_since = height;
    }

    /// Register membership in a new vault key. Idempotent.
    pub fn try_add_signer_pub_key(&mut self, key: &PubKey) {
        if key.is_empty() || self.signer_membership.contains(key) {
            return;
        }
        self.signer_membership.push(key.clone());
        self.signer_membership.sort();
    }

    pub fn add_bond(&mut self, amount: Amount) {
        self.bond = self.bond.saturating_add(amount);
    }

    /// Slash up to `amount` from the bond; returns what was actually taken.
    pub fn slash_bond(&mut self, amount: Amount) -> Amount {
        let taken = self.bond.min(amount);
        self.bond -= taken;
        taken
    }
}

impl fmt::Display for NodeAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) bond={} since {}",
            self.node_address, self.status, self.bond, self.status_since
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> NodeAccount {
        NodeAccount::new(Address::unchecked("node1operator000"), PubKey::new("nodepk"), 1)
    }

    #[test]
    fn new_nodes_start_whitelisted_with_no_bond() {
        let na = node();
        assert_eq!(na.status, NodeStatus::WhiteListed);
        assert_eq!(na.bond, 0);
        assert!(!na.is_active());
    }

    #[test]
    fn signer_membership_is_idempotent() {
        let mut na = node();
        let key = PubKey::new("vaultkey");
        na.try_add_signer_pub_key(&key);
        na.try_add_signer_pub_key(&key);
        na.try_add_signer_pub_key(&PubKey::empty());
        assert_eq!(na.signer_membership, vec![key]);
    }

    #[test]
    fn slash_never_underflows() {
        let mut na = node();
        na.add_bond(100);
        assert_eq!(na.slash_bond(250), 100);
        assert_eq!(na.bond, 0);
    }
}
