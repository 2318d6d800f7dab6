//! Vault Lifecycle Manager
//!
//! Owns the asgard fleet: bootstrapping the first vault at genesis,
//! scheduling keygen ceremonies, rotating a freshly keyed vault in (and
//! its predecessors out), and draining retiring vaults into active ones
//! in staged migrations.
//!
//! Rotation never moves funds by itself. A retiring vault keeps its coins
//! until the migration tick enqueues staged outbounds, and its balance is
//! only written down when those outbounds are observed on-chain; so each
//! round's amount is computed against the full standing balance:
//! round `n` of 5 moves `n/5` of it, and round 5 moves everything.

use lib_types::{BlockHeight, PubKey, TxId};

use crate::constants::Constants;
use crate::errors::{HandlerError, HandlerResult};
use crate::node_account::NodeAccount;
use crate::storage::Keeper;
use crate::tss::Keygens;
use crate::txout::{self, TxOutItem};
use crate::vault::{Vault, VaultKind, VaultStatus};

/// Height at which genesis vault setup runs.
pub const GENESIS_BLOCK_HEIGHT: BlockHeight = 1;

/// Bootstrap the asgard fleet at genesis: a lone active node gets a
/// single-member vault keyed by its own pubkey; a larger set gets a keygen
/// ceremony scheduled and the vault materializes when `TssPool` arrives.
pub fn process_genesis(keeper: &dyn Keeper) -> HandlerResult<()> {
    if keeper.current_height()? != GENESIS_BLOCK_HEIGHT {
        return Ok(());
    }
    let existing = keeper
        .iterate_vaults()?
        .into_iter()
        .any(|v| v.is_asgard());
    if existing {
        tracing::info!("asgard vault already present, skipping genesis setup");
        return Ok(());
    }
    let active = keeper.list_active_nodes()?;
    match active.len() {
        0 => {
            tracing::warn!("no active nodes at genesis, nothing to bootstrap");
            Ok(())
        }
        1 => {
            let node = &active[0];
            let mut vault = Vault::new(
                node.pub_key.clone(),
                VaultStatus::Active,
                VaultKind::Asgard,
                GENESIS_BLOCK_HEIGHT,
            );
            vault.set_membership(vec![node.pub_key.clone()]);
            tracing::info!(vault = %vault.pub_key, "created single-member genesis asgard");
            keeper.set_vault(&vault)?;
            Ok(())
        }
        _ => trigger_keygen(keeper, &active),
    }
}

/// Schedule a keygen ceremony over the given nodes. External signers
/// observe the record, run the threshold protocol, and submit the
/// resulting key back as a `TssPool` message.
pub fn trigger_keygen(keeper: &dyn Keeper, nodes: &[NodeAccount]) -> HandlerResult<()> {
    let height = keeper.current_height()?;
    let mut keygens = keeper
        .get_keygens(height)?
        .unwrap_or_else(|| Keygens::new(height));
    keygens.add_group(nodes.iter().map(|na| na.pub_key.clone()).collect());
    tracing::info!(height, members = nodes.len(), "scheduling keygen ceremony");
    keeper.set_keygens(&keygens)?;
    Ok(())
}

/// Install a freshly keyed asgard vault: any previously active asgard
/// sharing at least one member retires, and every member node registers
/// the new vault key in its signer membership.
pub fn rotate_vault(keeper: &dyn Keeper, vault: Vault) -> HandlerResult<()> {
    let height = keeper.current_height()?;

    for mut asgard in keeper.get_vaults_by_status(VaultStatus::Active, VaultKind::Asgard)? {
        if asgard.pub_key == vault.pub_key {
            continue;
        }
        if asgard.membership.iter().any(|m| vault.contains(m)) {
            tracing::info!(retiring = %asgard.pub_key, "asgard vault superseded, retiring");
            asgard.update_status(VaultStatus::Retiring, height);
            keeper.set_vault(&asgard)?;
        }
    }

    for member in &vault.membership {
        if let Some(mut node) = keeper.get_node_account_by_pubkey(member)? {
            node.try_add_signer_pub_key(&vault.pub_key);
            keeper.set_node_account(&node)?;
        }
    }

    tracing::info!(active = %vault.pub_key, members = vault.membership.len(), "new asgard vault active");
    keeper.set_vault(&vault)?;
    Ok(())
}

/// The migration tick, run once per block after all messages.
///
/// Every `fund_migration_interval` blocks each retiring vault sends a
/// slice of each coin to the active asgard holding the least of it:
/// `nth = (now - status_since)/interval`, amount `coins·nth/5`, the
/// whole remainder once `nth >= 5`. Emptied vaults are deleted.
pub fn migrate_retiring_funds(keeper: &dyn Keeper, constants: &Constants) -> HandlerResult<()> {
    let height = keeper.current_height()?;
    let interval = constants.fund_migration_interval;
    if interval == 0 {
        return Ok(());
    }

    let retiring = keeper.get_vaults_by_status(VaultStatus::Retiring, VaultKind::Asgard)?;
    if retiring.is_empty() {
        return Ok(());
    }
    let active = keeper.get_vaults_by_status(VaultStatus::Active, VaultKind::Asgard)?;
    if active.is_empty() {
        // Nowhere to move funds; try again next tick.
        return Ok(());
    }

    for vault in retiring {
        if !vault.has_funds() {
            tracing::info!(vault = %vault.pub_key, "retiring vault drained, deleting");
            keeper.delete_vault(&vault.pub_key)?;
            continue;
        }

        let since = vault.status_since;
        if height <= since || (height - since) % interval != 0 {
            continue;
        }
        // Round counter: 1 at the first tick after retirement, 5 (and
        // beyond) meaning "move everything".
        let nth = (height - since) / interval;

        for coin in vault.coins.iter() {
            // Target the active asgard shallowest in this coin to level
            // the fleet as funds move.
            let receiver = active
                .iter()
                .min_by_key(|a| a.balance_of(&coin.asset))
                .ok_or_else(|| {
                    HandlerError::InvariantViolation(
                        "no active asgard to receive migrated funds".to_string(),
                    )
                })?;
            let to_address = receiver.address_on(&coin.asset.chain);

            let amount = if nth < 5 {
                coin.amount.saturating_mul(nth as u128) / 5
            } else {
                coin.amount
            };
            if amount == 0 {
                continue;
            }

            tracing::info!(
                from = %vault.pub_key,
                to = %receiver.pub_key,
                coin = %coin,
                nth,
                amount,
                "staged vault migration"
            );
            let item = TxOutItem::new(
                coin.asset.chain.clone(),
                to_address,
                coin.asset.clone(),
                amount,
                TxId::blank(),
                format!("migrate:{height}"),
            )
            .with_vault(vault.pub_key.clone());
            txout::try_add_tx_out_item(keeper, constants, item)?;
        }
    }
    Ok(())
}

/// Whether `address` belongs to any Active asgard vault on `chain`
/// (yggdrasil returns must pay one).
pub fn is_asgard_address(
    keeper: &dyn Keeper,
    chain: &lib_types::Chain,
    address: &lib_types::Address,
) -> HandlerResult<bool> {
    for vault in keeper.get_vaults_by_status(VaultStatus::Active, VaultKind::Asgard)? {
        if &vault.address_on(chain) == address {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Fetch-or-create the yggdrasil vault owned by `pub_key`.
pub fn get_or_create_yggdrasil(keeper: &dyn Keeper, pub_key: &PubKey) -> HandlerResult<Vault> {
    if let Some(vault) = keeper.get_vault(pub_key)? {
        return Ok(vault);
    }
    let height = keeper.current_height()?;
    let mut vault = Vault::new(
        pub_key.clone(),
        VaultStatus::Active,
        VaultKind::Yggdrasil,
        height,
    );
    vault.set_membership(vec![pub_key.clone()]);
    Ok(vault)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{Constants, CURRENT_VERSION};
    use crate::node_account::NodeStatus;
    use crate::storage::SledKeeper;
    use lib_types::{Address, Asset, ONE};

    fn consts() -> &'static Constants {
        Constants::for_version(CURRENT_VERSION).unwrap()
    }

    fn active_node(keeper: &SledKeeper, tag: &str) -> NodeAccount {
        let mut na = NodeAccount::new(
            Address::unchecked(&format!("node1operator{tag}0")),
            PubKey::new(&format!("nodepk-{tag}")),
            1,
        );
        na.update_status(NodeStatus::Active, 1);
        keeper.set_node_account(&na).unwrap();
        na
    }

    #[test]
    fn genesis_with_one_node_creates_single_member_asgard() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(1).unwrap();
        let node = active_node(&keeper, "aa");
        process_genesis(&keeper).unwrap();
        let vault = keeper.get_vault(&node.pub_key).unwrap().unwrap();
        assert!(vault.is_asgard());
        assert!(vault.is_active());
        assert_eq!(vault.membership, vec![node.pub_key]);
        // No ceremony needed.
        assert!(keeper.iterate_keygens().unwrap().is_empty());
    }

    #[test]
    fn genesis_with_many_nodes_schedules_a_keygen() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(1).unwrap();
        active_node(&keeper, "aa");
        active_node(&keeper, "bb");
        process_genesis(&keeper).unwrap();
        assert!(keeper.iterate_vaults().unwrap().is_empty());
        let keygens = keeper.get_keygens(1).unwrap().unwrap();
        assert_eq!(keygens.groups.len(), 1);
        assert_eq!(keygens.groups[0].len(), 2);
    }

    #[test]
    fn genesis_runs_only_at_height_one() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(2).unwrap();
        active_node(&keeper, "aa");
        process_genesis(&keeper).unwrap();
        assert!(keeper.iterate_vaults().unwrap().is_empty());
    }

    #[test]
    fn rotation_retires_overlapping_vaults_and_registers_members() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(10).unwrap();
        let node_a = active_node(&keeper, "aa");
        let node_b = active_node(&keeper, "bb");

        let mut old = Vault::new(
            PubKey::new("oldvault"),
            VaultStatus::Active,
            VaultKind::Asgard,
            1,
        );
        old.set_membership(vec![node_a.pub_key.clone()]);
        keeper.set_vault(&old).unwrap();

        let mut disjoint = Vault::new(
            PubKey::new("disjointvault"),
            VaultStatus::Active,
            VaultKind::Asgard,
            1,
        );
        disjoint.set_membership(vec![PubKey::new("elsewhere")]);
        keeper.set_vault(&disjoint).unwrap();

        let mut fresh = Vault::new(
            PubKey::new("newvault"),
            VaultStatus::Active,
            VaultKind::Asgard,
            10,
        );
        fresh.set_membership(vec![node_a.pub_key.clone(), node_b.pub_key.clone()]);
        rotate_vault(&keeper, fresh.clone()).unwrap();

        let old = keeper.get_vault(&old.pub_key).unwrap().unwrap();
        assert_eq!(old.status, VaultStatus::Retiring);
        assert_eq!(old.status_since, 10);
        let disjoint = keeper.get_vault(&disjoint.pub_key).unwrap().unwrap();
        assert_eq!(disjoint.status, VaultStatus::Active);

        let na = keeper.get_node_account(&node_a.node_address).unwrap().unwrap();
        assert!(na.signer_membership.contains(&fresh.pub_key));
    }

    #[test]
    fn migration_follows_the_five_round_schedule() {
        let keeper = SledKeeper::open_temporary().unwrap();
        let interval = consts().fund_migration_interval;
        let btc = Asset::new("BTC.BTC").unwrap();

        keeper.begin_block(100).unwrap();
        let mut retiring = Vault::new(
            PubKey::new("retiringvault"),
            VaultStatus::Retiring,
            VaultKind::Asgard,
            100,
        );
        retiring.credit(&btc, 1_000 * ONE);
        keeper.set_vault(&retiring).unwrap();
        let receiver = Vault::new(
            PubKey::new("newvault"),
            VaultStatus::Active,
            VaultKind::Asgard,
            100,
        );
        keeper.set_vault(&receiver).unwrap();
        keeper.commit_block().unwrap();

        // Rounds 1-4 move 20/40/60/80% of the standing balance; round 5
        // moves everything.
        let expected = [200, 400, 600, 800, 1_000];
        for (round, want) in expected.iter().enumerate() {
            let height = 100 + interval * (round as u64 + 1);
            keeper.begin_block(height).unwrap();
            migrate_retiring_funds(&keeper, consts()).unwrap();
            let items = keeper.get_txout(height).unwrap();
            assert_eq!(items.len(), 1, "round {} should enqueue one item", round + 1);
            assert_eq!(items[0].coin.amount, want * ONE);
            assert_eq!(items[0].vault_pub_key, retiring.pub_key);
            assert!(!items[0].reserved);
            keeper.commit_block().unwrap();
        }

        // Off-interval heights do nothing.
        keeper.begin_block(100 + interval + 1).unwrap();
        migrate_retiring_funds(&keeper, consts()).unwrap();
        assert!(keeper.get_txout(100 + interval + 1).unwrap().is_empty());
        keeper.commit_block().unwrap();

        // Once the confirmations drain the coins, the next tick deletes
        // the vault.
        keeper.begin_block(100 + interval * 6).unwrap();
        let mut drained = keeper.get_vault(&retiring.pub_key).unwrap().unwrap();
        drained.coins = lib_types::Coins::new();
        keeper.set_vault(&drained).unwrap();
        migrate_retiring_funds(&keeper, consts()).unwrap();
        assert!(keeper.get_vault(&retiring.pub_key).unwrap().is_none());
    }

    #[test]
    fn migration_targets_the_shallowest_active_asgard() {
        let keeper = SledKeeper::open_temporary().unwrap();
        let interval = consts().fund_migration_interval;
        let btc = Asset::new("BTC.BTC").unwrap();

        keeper.begin_block(interval).unwrap();
        let mut retiring = Vault::new(
            PubKey::new("retiringvault"),
            VaultStatus::Retiring,
            VaultKind::Asgard,
            0,
        );
        retiring.credit(&btc, 100 * ONE);
        keeper.set_vault(&retiring).unwrap();

        let mut deep = Vault::new(PubKey::new("deep"), VaultStatus::Active, VaultKind::Asgard, 0);
        deep.credit(&btc, 500 * ONE);
        keeper.set_vault(&deep).unwrap();
        let shallow = Vault::new(PubKey::new("shallow"), VaultStatus::Active, VaultKind::Asgard, 0);
        keeper.set_vault(&shallow).unwrap();

        migrate_retiring_funds(&keeper, consts()).unwrap();
        let items = keeper.get_txout(interval).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].to_address,
            shallow.address_on(&btc.chain),
            "funds must flow to the asgard holding the least of the coin"
        );
    }

    #[test]
    fn yggdrasil_get_or_create_is_single_member() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(5).unwrap();
        let pk = PubKey::new("nodepk");
        let vault = get_or_create_yggdrasil(&keeper, &pk).unwrap();
        assert!(vault.is_yggdrasil());
        assert_eq!(vault.membership, vec![pk]);
    }
}
