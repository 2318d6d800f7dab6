//! Outbound Transaction Store
//!
//! Handlers never talk to external chains; they enqueue [`TxOutItem`]s
//! here and the external signer drains the queue. The store owns three
//! responsibilities:
//!
//! - **At-most-once emission**: for each `(in_hash, to_address, asset)`
//!   triple at most one item is ever enqueued; re-adds are no-ops.
//! - **Vault selection and fund accounting**: an item without a preset
//!   vault is assigned one (yggdrasil float first, deepest asgard as
//!   fallback) and that vault's coins are debited on the spot, so two
//!   outbounds in one block cannot both spend the same balance. Items
//!   arriving with a vault already chosen (migrations, yggdrasil funding)
//!   are debited when their outbound is observed instead; their amounts
//!   were computed against the vault's standing balance.
//! - **Gas**: the expected network fee is subtracted from the amount, not
//!   added on top. An amount the fee would consume entirely becomes a
//!   refund event, not an item.

use serde::{Deserialize, Serialize};
use std::fmt;

use lib_types::{Address, Amount, Asset, Chain, Coin, Coins, PubKey, Tx, TxId};

use crate::constants::Constants;
use crate::errors::{codes, HandlerError, HandlerResult};
use crate::events::{self, EventPayload, EventStatus};
use crate::node_account::NodeAccount;
use crate::storage::Keeper;
use crate::vault::{Vault, VaultKind, VaultStatus};

/// One outbound transfer waiting to be signed and broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutItem {
    pub chain: Chain,
    pub to_address: Address,
    /// Vault expected to pay. Empty until the store assigns one.
    pub vault_pub_key: PubKey,
    pub coin: Coin,
    pub memo: String,
    /// Inbound transfer this outbound answers; blank for internally
    /// generated transfers (migrations).
    pub in_hash: TxId,
    /// Filled once the signed transaction is observed on-chain.
    pub out_hash: TxId,
    /// Whether the paying vault's coins were already debited at enqueue
    /// time (store-selected vaults) or are still standing (preset vaults,
    /// debited at confirmation).
    pub reserved: bool,
}

impl TxOutItem {
    pub fn new(
        chain: Chain,
        to_address: Address,
        asset: Asset,
        amount: Amount,
        in_hash: TxId,
        memo: String,
    ) -> Self {
        Self {
            chain,
            to_address,
            vault_pub_key: PubKey::empty(),
            coin: Coin::new(asset, amount),
            memo,
            in_hash,
            out_hash: TxId::blank(),
            reserved: false,
        }
    }

    /// Same item with the paying vault chosen up front (the store will
    /// skip selection and leave the vault's balance standing).
    pub fn with_vault(mut self, pub_key: PubKey) -> Self {
        self.vault_pub_key = pub_key;
        self
    }

    pub fn is_signed(&self) -> bool {
        !self.out_hash.is_blank()
    }

    /// Dedup identity.
    pub fn matches(&self, in_hash: &TxId, to_address: &Address, asset: &Asset) -> bool {
        &self.in_hash == in_hash && &self.to_address == to_address && &self.coin.asset == asset
    }
}

impl fmt::Display for TxOutItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "out {} -> {} on {} (in={}, vault={})",
            self.coin, self.to_address, self.chain, self.in_hash, self.vault_pub_key
        )
    }
}

/// Expected network fee for an outbound on `chain`: the last observed fee
/// report, or the configured default.
pub fn expected_gas_fee(
    keeper: &dyn Keeper,
    constants: &Constants,
    chain: &Chain,
) -> HandlerResult<Amount> {
    Ok(keeper
        .get_network_fee(chain)?
        .unwrap_or_else(|| constants.default_outbound_gas_fee(chain)))
}

/// Enqueue an outbound, idempotently. Returns whether a new item was
/// queued (`false` when a matching item is already pending, or when the
/// amount did not survive the network fee and a refund event was recorded
/// instead).
pub fn try_add_tx_out_item(
    keeper: &dyn Keeper,
    constants: &Constants,
    mut item: TxOutItem,
) -> HandlerResult<bool> {
    // At-most-once per (in_hash, to, asset). Blank-hash items are
    // internal transfers with no originating inbound to key on.
    if !item.in_hash.is_blank() {
        for (_, items) in keeper.iterate_txout()? {
            for existing in items {
                if existing.matches(&item.in_hash, &item.to_address, &item.coin.asset) {
                    tracing::debug!(%existing, "outbound already queued, skipping");
                    return Ok(false);
                }
            }
        }
    }

    // Gas comes out of the transfer, never on top of it. Two exemptions:
    // internal transfers (blank in-hash), where the signer nets gas out of
    // the vault-to-vault amount itself, and native-chain transfers, which
    // the host ledger module executes without an external signer.
    let fee = if item.in_hash.is_blank() || item.chain.is_native() {
        0
    } else {
        expected_gas_fee(keeper, constants, &item.chain)?
    };
    let Some(remaining) = item.coin.amount.checked_sub(fee).filter(|r| *r > 0) else {
        tracing::info!(%item, fee, "outbound amount consumed by network fee, refunding");
        let in_tx = Tx::new(
            item.in_hash.clone(),
            item.chain.clone(),
            Address::empty(),
            item.to_address.clone(),
            Coins::from_vec(vec![item.coin.clone()]),
            Coins::new(),
            item.memo.clone(),
        );
        events::record(
            keeper,
            in_tx,
            EventStatus::Refund,
            EventPayload::Refund {
                code: codes::INSUFFICIENT_FUNDS,
                reason: "outbound amount does not cover the network fee".to_string(),
            },
        )?;
        return Ok(false);
    };
    item.coin.amount = remaining;

    // Native-chain transfers (bond refunds, RUNE payouts) are executed by
    // the host ledger module directly; only external-chain outbounds need
    // a paying vault.
    if item.vault_pub_key.is_empty() && !item.chain.is_native() {
        let vault = select_vault(keeper, &item.coin.asset, item.coin.amount)?;
        item.vault_pub_key = vault.pub_key.clone();
        item.reserved = true;
        // Reserve the funds now so a later outbound in this same block
        // cannot plan to spend them too.
        let mut vault = vault;
        vault.debit(&item.coin.asset, item.coin.amount);
        keeper.set_vault(&vault)?;
    }

    let height = keeper.current_height()?;
    tracing::info!(%item, height, "queueing outbound");
    keeper.append_txout(height, &item)?;
    Ok(true)
}

/// Pick the vault that pays an outbound of `amount` of `asset`: a
/// yggdrasil vault whose owning node is Active and whose float covers the
/// amount, else the Active asgard holding the most of the asset.
fn select_vault(keeper: &dyn Keeper, asset: &Asset, amount: Amount) -> HandlerResult<Vault> {
    let yggs = keeper.get_vaults_by_status(VaultStatus::Active, VaultKind::Yggdrasil)?;
    for ygg in yggs {
        if ygg.balance_of(asset) < amount {
            continue;
        }
        let owner: Option<NodeAccount> = keeper.get_node_account_by_pubkey(&ygg.pub_key)?;
        if owner.map(|na| na.is_active()).unwrap_or(false) {
            return Ok(ygg);
        }
    }

    let asgards = keeper.get_vaults_by_status(VaultStatus::Active, VaultKind::Asgard)?;
    let best = asgards
        .into_iter()
        .max_by_key(|v| v.balance_of(asset))
        .filter(|v| v.balance_of(asset) >= amount);
    best.ok_or_else(|| {
        HandlerError::validation(
            codes::INSUFFICIENT_FUNDS,
            format!("no vault holds {amount} of {asset}"),
        )
    })
}

/// Match an observed outbound against the queue: fill `out_hash`, settle
/// the paying vault's ledger, and return the completed item. `None` when
/// nothing in the queue matches (already completed, or never ours).
pub fn complete_tx_out_item(
    keeper: &dyn Keeper,
    in_hash: &TxId,
    observed: &Tx,
) -> HandlerResult<Option<TxOutItem>> {
    for (height, mut items) in keeper.iterate_txout()? {
        for idx in 0..items.len() {
            let candidate = &items[idx];
            if candidate.is_signed() {
                continue;
            }
            let pays_this = observed
                .coins
                .iter()
                .any(|c| candidate.matches(in_hash, &observed.to_address, &c.asset));
            if !pays_this {
                continue;
            }

            let mut done = items[idx].clone();
            done.out_hash = observed.id.clone();

            if let Some(mut vault) = keeper.get_vault(&done.vault_pub_key)? {
                // Preset-vault items still hold their funds; settle now.
                if !done.reserved {
                    vault.debit(&done.coin.asset, done.coin.amount);
                }
                vault.outbound_tx_count += 1;
                keeper.set_vault(&vault)?;
            }

            items[idx] = done.clone();
            keeper.set_txout(height, &items)?;
            return Ok(Some(done));
        }
    }
    Ok(None)
}

/// Drop every unsigned item older than `signing_period` blocks, crediting
/// reserved funds back to their vault and recording a refund event per
/// item. Returns the reaped items.
pub fn reap_expired(
    keeper: &dyn Keeper,
    signing_period: u64,
) -> HandlerResult<Vec<TxOutItem>> {
    let now = keeper.current_height()?;
    let mut reaped = Vec::new();
    for (height, items) in keeper.iterate_txout()? {
        if now.saturating_sub(height) <= signing_period {
            continue;
        }
        let (expired, live): (Vec<_>, Vec<_>) =
            items.into_iter().partition(|item| !item.is_signed());
        if expired.is_empty() {
            continue;
        }
        keeper.set_txout(height, &live)?;
        for item in expired {
            tracing::warn!(%item, queued_at = height, "outbound unsigned past the signing window, reaping");
            if item.reserved {
                if let Some(mut vault) = keeper.get_vault(&item.vault_pub_key)? {
                    vault.credit(&item.coin.asset, item.coin.amount);
                    keeper.set_vault(&vault)?;
                }
            }
            let in_tx = Tx::new(
                item.in_hash.clone(),
                item.chain.clone(),
                Address::empty(),
                item.to_address.clone(),
                Coins::from_vec(vec![item.coin.clone()]),
                Coins::new(),
                item.memo.clone(),
            );
            events::record(
                keeper,
                in_tx,
                EventStatus::Refund,
                EventPayload::Refund {
                    code: codes::SIGNING_TIMEOUT,
                    reason: "outbound exceeded the signing window".to_string(),
                },
            )?;
            reaped.push(item);
        }
    }
    Ok(reaped)
}
