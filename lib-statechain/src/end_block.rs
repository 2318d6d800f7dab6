//! End-of-Block Hook
//!
//! Runs after every message in the block, in a fixed order:
//!
//! 1. vault lifecycle: genesis bootstrap at height 1, staged migration
//!    of retiring vaults afterwards;
//! 2. outbound reaping: unsigned items past the signing window are
//!    dropped and refunded;
//! 3. reward distribution: the per-block emission out of the reserve,
//!    split between node bonds and pools;
//! 4. keygen expiry: ceremonies nobody completed within the signing
//!    window are dropped.

use crate::constants::Constants;
use crate::errors::{HandlerError, HandlerResult};
use crate::events::{self, EventPayload, EventStatus, PoolAmount};
use crate::handlers::internal_tx;
use crate::storage::Keeper;
use crate::txout;
use crate::vault_manager::{self, GENESIS_BLOCK_HEIGHT};

pub fn end_block(keeper: &dyn Keeper) -> HandlerResult<()> {
    let version = keeper.get_version()?;
    let constants =
        Constants::for_version(version).ok_or(HandlerError::BadVersion { version })?;
    let height = keeper.current_height()?;

    if height == GENESIS_BLOCK_HEIGHT {
        vault_manager::process_genesis(keeper)?;
    } else {
        vault_manager::migrate_retiring_funds(keeper, constants)?;
    }

    txout::reap_expired(keeper, constants.signing_transaction_period)?;

    distribute_rewards(keeper, constants)?;

    expire_stale_keygens(keeper, constants)?;

    Ok(())
}

/// Pay the block emission out of the reserve: two thirds to Active node
/// bonds (equal shares), one third to enabled pools in proportion to
/// their RUNE depth. Dust from the integer splits stays in the reserve.
fn distribute_rewards(keeper: &dyn Keeper, constants: &Constants) -> HandlerResult<()> {
    let reserve = keeper.get_reserve()?;
    let emission = constants.block_emission.min(reserve);
    if emission == 0 {
        return Ok(());
    }

    let bond_budget = emission * 2 / 3;
    let pool_budget = emission - bond_budget;
    let mut paid = 0u128;

    let active = keeper.list_active_nodes()?;
    let mut bond_reward = 0u128;
    if !active.is_empty() {
        let share = bond_budget / active.len() as u128;
        for mut node in active {
            node.add_bond(share);
            keeper.set_node_account(&node)?;
            bond_reward += share;
        }
        paid += bond_reward;
    }

    let pools: Vec<_> = keeper
        .iterate_pools()?
        .into_iter()
        .filter(|p| p.is_enabled() && p.balance_rune > 0)
        .collect();
    let total_depth: u128 = pools.iter().map(|p| p.balance_rune).sum();
    let mut pool_rewards = Vec::new();
    if total_depth > 0 {
        for mut pool in pools {
            let share = pool_budget * pool.balance_rune / total_depth;
            if share == 0 {
                continue;
            }
            pool.balance_rune += share;
            keeper.set_pool(&pool)?;
            pool_rewards.push(PoolAmount { asset: pool.asset.clone(), amount: share as i128 });
            paid += share;
        }
    }

    if paid == 0 {
        return Ok(());
    }
    keeper.set_reserve(reserve - paid)?;
    events::record(
        keeper,
        internal_tx(),
        EventStatus::Success,
        EventPayload::Rewards { bond_reward, pool_rewards },
    )?;
    Ok(())
}

/// Drop keygen ceremonies that outlived the signing window without a
/// `TssPool` completion.
fn expire_stale_keygens(keeper: &dyn Keeper, constants: &Constants) -> HandlerResult<()> {
    let height = keeper.current_height()?;
    for keygens in keeper.iterate_keygens()? {
        if height.saturating_sub(keygens.height) > constants.signing_transaction_period {
            tracing::warn!(scheduled_at = keygens.height, "keygen ceremony expired unanswered");
            keeper.delete_keygens(keygens.height)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CURRENT_VERSION;
    use crate::node_account::{NodeAccount, NodeStatus};
    use crate::pool::Pool;
    use crate::storage::SledKeeper;
    use crate::tss::Keygens;
    use lib_types::{Address, Asset, PubKey, ONE};

    fn consts() -> &'static Constants {
        Constants::for_version(CURRENT_VERSION).unwrap()
    }

    #[test]
    fn rewards_split_between_bonds_and_pools() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(10).unwrap();
        keeper.set_reserve(1_000 * ONE).unwrap();

        let mut node = NodeAccount::new(Address::unchecked("node1operator000"), PubKey::new("pk"), 1);
        node.update_status(NodeStatus::Active, 1);
        keeper.set_node_account(&node).unwrap();

        let mut pool = Pool::new(Asset::new("BNB.BNB").unwrap());
        pool.balance_rune = 100 * ONE;
        pool.balance_asset = 100 * ONE;
        pool.pool_units = 100 * ONE;
        pool.status = crate::pool::PoolStatus::Enabled;
        keeper.set_pool(&pool).unwrap();

        end_block(&keeper).unwrap();

        let emission = consts().block_emission;
        let node = keeper.get_node_account(&node.node_address).unwrap().unwrap();
        assert_eq!(node.bond, emission * 2 / 3);
        let pool = keeper.get_pool(&pool.asset).unwrap().unwrap();
        assert_eq!(pool.balance_rune, 100 * ONE + (emission - emission * 2 / 3));
        assert_eq!(keeper.get_reserve().unwrap(), 1_000 * ONE - emission);

        let rewards: Vec<_> = keeper
            .iterate_events()
            .unwrap()
            .into_iter()
            .filter(|e| e.event_type == "rewards")
            .collect();
        assert_eq!(rewards.len(), 1);
    }

    #[test]
    fn empty_reserve_pays_nothing() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(10).unwrap();
        end_block(&keeper).unwrap();
        assert!(keeper.iterate_events().unwrap().is_empty());
    }

    #[test]
    fn stale_keygens_expire() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(5).unwrap();
        let mut keygens = Keygens::new(5);
        keygens.add_group(vec![PubKey::new("a"), PubKey::new("b")]);
        keeper.set_keygens(&keygens).unwrap();
        keeper.commit_block().unwrap();

        let later = 5 + consts().signing_transaction_period + 1;
        keeper.begin_block(later).unwrap();
        end_block(&keeper).unwrap();
        assert!(keeper.get_keygens(5).unwrap().is_none());
    }
}
