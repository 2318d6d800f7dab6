//! Vaults
//!
//! Two kinds of vault hold user funds:
//!
//! - **Asgard**: a threshold-signed multi-party vault holding the bulk of
//!   funds. Asgards rotate: a fresh keygen produces a new Active vault and
//!   any old vault sharing a member retires, draining into the new one in
//!   staged migrations.
//! - **Yggdrasil**: a per-node vault with exactly one member (the owning
//!   node's key), holding a working float so the node can sign small
//!   outbounds without a threshold ceremony.
//!
//! # Invariants
//!
//! - A yggdrasil vault has exactly one member.
//! - An asgard's recorded coins equal observed inbounds minus confirmed
//!   outbounds, per asset.
//! - Retiring asgards are deleted only once their coins are empty.

use serde::{Deserialize, Serialize};
use std::fmt;

use lib_types::{Address, Amount, Asset, BlockHeight, Chain, Coins, PubKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultStatus {
    Active,
    Retiring,
    Inactive,
}

impl fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultStatus::Active => f.write_str("Active"),
            VaultStatus::Retiring => f.write_str("Retiring"),
            VaultStatus::Inactive => f.write_str("Inactive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultKind {
    Asgard,
    Yggdrasil,
}

impl fmt::Display for VaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultKind::Asgard => f.write_str("Asgard"),
            VaultKind::Yggdrasil => f.write_str("Yggdrasil"),
        }
    }
}

/// A fund-holding vault controlled by a threshold (or single) key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub pub_key: PubKey,
    pub status: VaultStatus,
    pub kind: VaultKind,
    /// Node keys that participated in this vault's keygen. Sorted, no
    /// duplicates; exactly one entry for yggdrasil vaults.
    pub membership: Vec<PubKey>,
    pub coins: Coins,
    /// Height at which `status` last changed; migration rounds are
    /// scheduled relative to this.
    pub status_since: BlockHeight,
    pub inbound_tx_count: u64,
    pub outbound_tx_count: u64,
}

impl Vault {
    pub fn new(pub_key: PubKey, status: VaultStatus, kind: VaultKind, height: BlockHeight) -> Self {
        Self {
            pub_key,
            status,
            kind,
            membership: Vec::new(),
            coins: Coins::new(),
            status_since: height,
            inbound_tx_count: 0,
            outbound_tx_count: 0,
        }
    }

    pub fn is_asgard(&self) -> bool {
        self.kind == VaultKind::Asgard
    }

    pub fn is_yggdrasil(&self) -> bool {
        self.kind == VaultKind::Yggdrasil
    }

    pub fn is_active(&self) -> bool {
        self.status == VaultStatus::Active
    }

    pub fn has_funds(&self) -> bool {
        !self.coins.is_empty()
    }

    pub fn balance_of(&self, asset: &Asset) -> Amount {
        self.coins.get(asset)
    }

    /// The external address this vault controls on `chain`.
    pub fn address_on(&self, chain: &Chain) -> Address {
        self.pub_key.derive_address(chain)
    }

    pub fn contains(&self, member: &PubKey) -> bool {
        self.membership.contains(member)
    }

    pub fn set_membership(&mut self, mut members: Vec<PubKey>) {
        members.sort();
        members.dedup();
        self.membership = members;
    }

    pub fn update_status(&mut self, status: VaultStatus, height: BlockHeight) {
        self.status = status;
        self.status_since = height;
    }

    pub fn credit(&mut self, asset: &Asset, amount: Amount) {
        self.coins.add(asset, amount);
    }

    pub fn debit(&mut self, asset: &Asset, amount: Amount) {
        self.coins.sub(asset, amount);
    }
}

impl fmt::Display for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} vault {} since {} holding [{}]",
            self.status, self.kind, self.pub_key, self.status_since, self.coins
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::ONE;

    fn bnb() -> Asset {
        Asset::new("BNB.BNB").unwrap()
    }

    #[test]
    fn credit_debit_tracks_balance() {
        let mut v = Vault::new(PubKey::new("pk1"), VaultStatus::Active, VaultKind::Asgard, 1);
        assert!(!v.has_funds());
        v.credit(&bnb(), 3 * ONE);
        v.debit(&bnb(), ONE);
        assert_eq!(v.balance_of(&bnb()), 2 * ONE);
        assert!(v.has_funds());
    }

    #[test]
    fn membership_is_sorted_and_deduped() {
        let mut v = Vault::new(PubKey::new("pk1"), VaultStatus::Active, VaultKind::Asgard, 1);
        v.set_membership(vec![PubKey::new("b"), PubKey::new("a"), PubKey::new("b")]);
        assert_eq!(v.membership, vec![PubKey::new("a"), PubKey::new("b")]);
        assert!(v.contains(&PubKey::new("a")));
        assert!(!v.contains(&PubKey::new("c")));
    }

    #[test]
    fn chain_addresses_differ_per_chain_but_are_stable() {
        let v = Vault::new(PubKey::new("pk1"), VaultStatus::Active, VaultKind::Asgard, 1);
        let bnb_chain = Chain::new("BNB").unwrap();
        let btc_chain = Chain::new("BTC").unwrap();
        assert_eq!(v.address_on(&bnb_chain), v.address_on(&bnb_chain));
        assert_ne!(v.address_on(&bnb_chain), v.address_on(&btc_chain));
    }
}
