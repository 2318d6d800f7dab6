//! Yggdrasil Handler
//!
//! Yggdrasil moves are observed in two halves. Funding (`yggdrasil+`):
//! an outbound leaving asgard and an inbound arriving at the node's
//! vault. Returning (`yggdrasil-`): an outbound leaving the node's vault
//! and an inbound arriving at asgard. Which half we are looking at is
//! decided by the kind of the vault the observer tagged.
//!
//! A return that does not pay an active asgard address is theft from the
//! network's point of view: the node's bond is slashed by the coins'
//! RUNE value.

use lib_types::{Coins, PubKey, Tx};

use super::bond;
use crate::constants::Constants;
use crate::errors::HandlerResult;
use crate::events::{self, EventPayload, EventStatus};
use crate::slash;
use crate::storage::Keeper;
use crate::vault_manager;

pub fn run(
    keeper: &dyn Keeper,
    constants: &Constants,
    pub_key: &PubKey,
    add_funds: bool,
    coins: Coins,
    tx: &Tx,
) -> HandlerResult<()> {
    if add_funds {
        fund(keeper, pub_key, coins, tx)
    } else {
        give_back(keeper, constants, pub_key, coins, tx)
    }
}

/// `yggdrasil+`: asgard half debits, yggdrasil half credits (creating the
/// vault on first funding).
fn fund(keeper: &dyn Keeper, pub_key: &PubKey, coins: Coins, tx: &Tx) -> HandlerResult<()> {
    match keeper.get_vault(pub_key)? {
        Some(mut vault) if vault.is_asgard() => {
            // Outbound half: the funds leave asgard here.
            for coin in coins.iter() {
                vault.debit(&coin.asset, coin.amount);
            }
            vault.outbound_tx_count += 1;
            keeper.set_vault(&vault)?;
            tracing::info!(asgard = %pub_key, tx = %tx.id, "asgard funded a yggdrasil vault");
            Ok(())
        }
        _ => {
            // Inbound half: the node's vault receives its float.
            let mut vault = vault_manager::get_or_create_yggdrasil(keeper, pub_key)?;
            for coin in coins.iter() {
                vault.credit(&coin.asset, coin.amount);
            }
            vault.inbound_tx_count += 1;
            keeper.set_vault(&vault)?;
            tracing::info!(yggdrasil = %pub_key, tx = %tx.id, "yggdrasil vault received funds");
            events::record(
                keeper,
                tx.clone(),
                EventStatus::Success,
                EventPayload::Yggdrasil { pub_key: pub_key.clone(), coins, fund: true },
            )?;
            Ok(())
        }
    }
}

/// `yggdrasil-`: the node vault half pays out (and faces the asgard
/// check); the asgard half books the incoming funds.
fn give_back(
    keeper: &dyn Keeper,
    constants: &Constants,
    pub_key: &PubKey,
    coins: Coins,
    tx: &Tx,
) -> HandlerResult<()> {
    match keeper.get_vault(pub_key)? {
        Some(mut vault) if vault.is_yggdrasil() => {
            for coin in coins.iter() {
                vault.debit(&coin.asset, coin.amount);
            }
            vault.outbound_tx_count += 1;

            let to_asgard = vault_manager::is_asgard_address(keeper, &tx.chain, &tx.to_address)?;
            if !to_asgard {
                tracing::warn!(
                    yggdrasil = %pub_key,
                    to = %tx.to_address,
                    "yggdrasil return misdirected, slashing bond"
                );
                for coin in coins.iter() {
                    slash::slash_node_account(keeper, pub_key, &coin.asset, coin.amount, tx.clone())?;
                }
            }

            if vault.has_funds() {
                keeper.set_vault(&vault)?;
            } else {
                // Fully drained; the vault's job is done.
                keeper.delete_vault(&vault.pub_key)?;
            }

            // A leaving (or otherwise inactive) node gets its bond back
            // once the float is home and honest.
            if to_asgard {
                if let Some(mut node) = keeper.get_node_account_by_pubkey(pub_key)? {
                    if !node.is_active() && node.requested_to_leave {
                        bond::refund_bond(keeper, constants, &mut node, tx)?;
                        keeper.set_node_account(&node)?;
                    }
                }
            }
            Ok(())
        }
        Some(mut vault) if vault.is_asgard() => {
            // Inbound half: asgard books the returned float.
            for coin in coins.iter() {
                vault.credit(&coin.asset, coin.amount);
            }
            vault.inbound_tx_count += 1;
            keeper.set_vault(&vault)?;
            events::record(
                keeper,
                tx.clone(),
                EventStatus::Success,
                EventPayload::Yggdrasil { pub_key: pub_key.clone(), coins, fund: false },
            )?;
            Ok(())
        }
        _ => {
            tracing::warn!(vault = %pub_key, tx = %tx.id, "yggdrasil return for unknown vault");
            Ok(())
        }
    }
}
