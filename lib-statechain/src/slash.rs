//! Bond Slashing
//!
//! When a node's vault misbehaves (most importantly a yggdrasil return
//! paid to an address that is not an active asgard), the node's bond pays
//! for the damage. Non-native amounts are valued through the pool: the
//! pool writes the lost asset down and is compensated in RUNE out of the
//! slashed bond, so stakers are kept whole and the operator eats the loss.

use lib_types::{Amount, Asset, PubKey};

use crate::errors::{HandlerError, HandlerResult};
use crate::events::{self, EventPayload, EventStatus, PoolAmount};
use crate::storage::Keeper;

/// Slash the bond of the node owning `pub_key` by `amount` of `asset`
/// (valued in RUNE at the current pool price). Returns the RUNE value
/// actually taken.
pub fn slash_node_account(
    keeper: &dyn Keeper,
    pub_key: &PubKey,
    asset: &Asset,
    amount: Amount,
    in_tx: lib_types::Tx,
) -> HandlerResult<Amount> {
    let Some(mut node) = keeper.get_node_account_by_pubkey(pub_key)? else {
        return Err(HandlerError::InvariantViolation(format!(
            "slash target {pub_key} has no node account"
        )));
    };

    let (rune_value, pool_amounts) = if asset.is_rune() {
        (amount, vec![PoolAmount { asset: asset.clone(), amount: -(amount as i128) }])
    } else {
        let Some(mut pool) = keeper.get_pool(asset)? else {
            return Err(HandlerError::InvariantViolation(format!(
                "slash references missing pool {asset}"
            )));
        };
        let rune_value = pool.asset_value_in_rune(amount);
        // The asset left the system; the bond's RUNE backfills the pool.
        pool.balance_asset = pool.balance_asset.saturating_sub(amount);
        pool.balance_rune = pool
            .balance_rune
            .checked_add(rune_value)
            .ok_or_else(|| HandlerError::InvariantViolation("pool rune overflow".to_string()))?;
        keeper.set_pool(&pool)?;
        (
            rune_value,
            vec![
                PoolAmount { asset: asset.clone(), amount: -(amount as i128) },
                PoolAmount { asset: Asset::native_rune(), amount: rune_value as i128 },
            ],
        )
    };

    let taken = node.slash_bond(rune_value);
    if taken < rune_value {
        tracing::warn!(
            node = %node.node_address,
            rune_value,
            taken,
            "bond too small to absorb the whole slash"
        );
    }
    tracing::info!(node = %node.node_address, %asset, amount, taken, "slashed node bond");
    keeper.set_node_account(&node)?;

    events::record(
        keeper,
        in_tx,
        EventStatus::Success,
        EventPayload::Slash { pool: asset.clone(), amounts: pool_amounts },
    )?;
    Ok(taken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node_account::{NodeAccount, NodeStatus};
    use crate::pool::Pool;
    use crate::storage::SledKeeper;
    use lib_types::{Address, Chain, Coins, Tx, TxId, ONE};

    fn dummy_tx() -> Tx {
        Tx::new(
            TxId::new(&"ee".repeat(32)).unwrap(),
            Chain::new("BNB").unwrap(),
            Address::unchecked("bnb1senderaddr000"),
            Address::unchecked("bnb1otheraddr0000"),
            Coins::new(),
            Coins::new(),
            String::new(),
        )
    }

    #[test]
    fn slashing_an_asset_moves_value_from_bond_to_pool() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(1).unwrap();

        let bnb = Asset::new("BNB.BNB").unwrap();
        let mut pool = Pool::new(bnb.clone());
        pool.balance_rune = 200 * ONE;
        pool.balance_asset = 100 * ONE;
        pool.pool_units = 100 * ONE;
        keeper.set_pool(&pool).unwrap();

        let mut node = NodeAccount::new(
            Address::unchecked("node1operator000"),
            PubKey::new("nodepk"),
            1,
        );
        node.update_status(NodeStatus::Active, 1);
        node.add_bond(1_000 * ONE);
        keeper.set_node_account(&node).unwrap();

        // 10 BNB at 2 RUNE/BNB = 20 RUNE slashed.
        let taken =
            slash_node_account(&keeper, &node.pub_key, &bnb, 10 * ONE, dummy_tx()).unwrap();
        assert_eq!(taken, 20 * ONE);

        let node = keeper.get_node_account(&node.node_address).unwrap().unwrap();
        assert_eq!(node.bond, 980 * ONE);
        let pool = keeper.get_pool(&bnb).unwrap().unwrap();
        assert_eq!(pool.balance_asset, 90 * ONE);
        assert_eq!(pool.balance_rune, 220 * ONE);

        let events = keeper.iterate_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "slash");
    }

    #[test]
    fn slashing_rune_takes_bond_directly() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(1).unwrap();
        let mut node = NodeAccount::new(
            Address::unchecked("node1operator000"),
            PubKey::new("nodepk"),
            1,
        );
        node.add_bond(30 * ONE);
        keeper.set_node_account(&node).unwrap();

        let taken = slash_node_account(
            &keeper,
            &node.pub_key,
            &Asset::native_rune(),
            50 * ONE,
            dummy_tx(),
        )
        .unwrap();
        // Bond smaller than the slash: everything it has.
        assert_eq!(taken, 30 * ONE);
        let node = keeper.get_node_account(&node.node_address).unwrap().unwrap();
        assert_eq!(node.bond, 0);
    }
}
