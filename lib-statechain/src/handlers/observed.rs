//! Observed Inbound Handler
//!
//! The main entry point for user activity: chain observers report every
//! transfer touching a vault, and this handler books the funds, decodes
//! the memo, and routes to the matching flow. Any refundable failure
//! after the funds were booked (a malformed memo, a missing pool, a
//! breached slip limit) turns into a `refund` event plus outbounds
//! carrying the coins home. Only fatal errors abort the batch.

use lib_types::{Asset, Tx, TxId};

use super::{admin, bond, outbound, ragnarok, refund, stake, swap, unstake, yggdrasil};
use crate::constants::Constants;
use crate::errors::{codes, HandlerError, HandlerResult};
use crate::memo::Memo;
use crate::messages::ObservedTx;
use crate::storage::Keeper;

pub fn run(keeper: &dyn Keeper, constants: &Constants, txs: &[ObservedTx]) -> HandlerResult<()> {
    for observed in txs {
        process_one(keeper, constants, observed)?;
    }
    Ok(())
}

fn process_one(
    keeper: &dyn Keeper,
    constants: &Constants,
    observed: &ObservedTx,
) -> HandlerResult<()> {
    let tx = &observed.tx;
    if !tx.is_valid() {
        tracing::warn!(tx = %tx.id, "dropping malformed observation");
        return Ok(());
    }

    let memo = match Memo::parse(&tx.memo) {
        Ok(memo) => memo,
        Err(err) => {
            // The coins landed in the vault regardless; book them before
            // the refund sends them back out.
            credit_vault(keeper, observed)?;
            return refund(keeper, constants, tx, codes::MALFORMED_MEMO, err.to_string());
        }
    };

    match memo {
        // Confirmations of our own outbounds; nothing to credit.
        Memo::Outbound { tx_id } | Memo::Refund { tx_id } => {
            outbound::run(keeper, constants, tx, tx_id)
        }
        Memo::Migrate { .. } => outbound::run(keeper, constants, tx, TxId::blank()),

        // Vault-to-vault halves carry their own fund accounting.
        Memo::YggdrasilFund => yggdrasil::run(
            keeper,
            constants,
            &observed.observed_pub_key,
            true,
            tx.coins.clone(),
            tx,
        ),
        Memo::YggdrasilReturn => yggdrasil::run(
            keeper,
            constants,
            &observed.observed_pub_key,
            false,
            tx.coins.clone(),
            tx,
        ),

        // User actions: book the inbound funds, then route; refundable
        // failures send them back.
        memo => {
            credit_vault(keeper, observed)?;
            match route(keeper, constants, memo, tx) {
                Ok(()) => Ok(()),
                Err(err) if err.is_refundable() => {
                    refund(keeper, constants, tx, err.code(), err.to_string())
                }
                Err(err) => Err(err),
            }
        }
    }
}

/// Book the observed coins into the vault they arrived at.
fn credit_vault(keeper: &dyn Keeper, observed: &ObservedTx) -> HandlerResult<()> {
    let Some(mut vault) = keeper.get_vault(&observed.observed_pub_key)? else {
        // Native-chain transfers land on the module account, not a vault.
        return Ok(());
    };
    for coin in observed.tx.coins.iter() {
        vault.credit(&coin.asset, coin.amount);
    }
    vault.inbound_tx_count += 1;
    Ok(keeper.set_vault(&vault)?)
}

fn route(keeper: &dyn Keeper, constants: &Constants, memo: Memo, tx: &Tx) -> HandlerResult<()> {
    match memo {
        Memo::Stake { asset, address } => {
            // A memo without an asset leans on the coins: the one
            // non-native coin names the pool.
            let asset = match asset {
                Some(asset) => asset,
                None => tx
                    .coins
                    .iter()
                    .map(|c| c.asset.clone())
                    .find(|a| !a.is_rune())
                    .ok_or_else(|| {
                        HandlerError::validation(
                            codes::UNKNOWN_ASSET,
                            "stake memo names no pool and the transfer carries none",
                        )
                    })?,
            };
            let rune_amount = tx.coins.get(&Asset::native_rune());
            let asset_amount = tx.coins.get(&asset);
            let staker = if address.is_empty() { tx.from_address.clone() } else { address };
            stake::run(keeper, constants, &asset, rune_amount, asset_amount, &staker, tx)
        }
        Memo::Unstake { asset, basis_points } => {
            unstake::run(keeper, constants, &asset, basis_points, tx)
        }
        Memo::Swap { asset, destination, price_limit } => {
            swap::run(keeper, constants, &asset, &destination, price_limit, tx)
        }
        Memo::Bond { node_address } => {
            let amount = tx.coins.get(&Asset::native_rune());
            if amount == 0 {
                return Err(HandlerError::validation(
                    codes::INSUFFICIENT_FUNDS,
                    "bond memo without native funds",
                ));
            }
            bond::bond(keeper, constants, &node_address, amount, &tx.from_address, tx)
        }
        Memo::Leave => bond::leave(keeper, constants, tx),
        Memo::Add { asset } => {
            let rune_amount = tx.coins.get(&Asset::native_rune());
            let asset_amount = tx.coins.get(&asset);
            admin::add(keeper, &asset, rune_amount, asset_amount, tx)
        }
        Memo::Reserve => {
            let amount = tx.coins.get(&Asset::native_rune());
            if amount == 0 {
                return Err(HandlerError::validation(
                    codes::INSUFFICIENT_FUNDS,
                    "reserve memo without native funds",
                ));
            }
            admin::reserve(keeper, &tx.from_address, amount, tx)
        }
        // Gas top-ups refill a vault's fuel; the credit above is the
        // whole effect.
        Memo::Gas { .. } => Ok(()),
        Memo::Ragnarok { .. } => ragnarok::run(keeper, tx),
        // Handled before routing.
        Memo::Outbound { .. }
        | Memo::Refund { .. }
        | Memo::Migrate { .. }
        | Memo::YggdrasilFund
        | Memo::YggdrasilReturn => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::CURRENT_VERSION;
    use crate::storage::SledKeeper;
    use crate::vault::{Vault, VaultKind, VaultStatus};
    use lib_types::{Address, Chain, Coin, Coins, PubKey, ONE};

    fn consts() -> &'static Constants {
        Constants::for_version(CURRENT_VERSION).unwrap()
    }

    fn bnb() -> Asset {
        Asset::new("BNB.BNB").unwrap()
    }

    fn vault_pk() -> PubKey {
        PubKey::new("asgardpk")
    }

    fn seed_vault(keeper: &SledKeeper) {
        let mut vault = Vault::new(vault_pk(), VaultStatus::Active, VaultKind::Asgard, 1);
        vault.credit(&bnb(), 1_000 * ONE);
        keeper.set_vault(&vault).unwrap();
    }

    fn observation(memo: &str, coins: Vec<Coin>, tag: &str) -> ObservedTx {
        ObservedTx {
            tx: Tx::new(
                TxId::new(&tag.repeat(32)).unwrap(),
                Chain::new("BNB").unwrap(),
                Address::unchecked("bnb1senderaddr000"),
                Address::unchecked("bnb1vaultaddr0000"),
                Coins::from_vec(coins),
                Coins::new(),
                memo.to_string(),
            ),
            block_height: 100,
            observed_pub_key: vault_pk(),
        }
    }

    #[test]
    fn stake_memo_flows_end_to_end() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(1).unwrap();
        seed_vault(&keeper);

        let obs = observation(
            "stake:BNB.BNB:bnb1stakeraddress",
            vec![
                Coin::new(Asset::native_rune(), 100 * ONE),
                Coin::new(bnb(), 100 * ONE),
            ],
            "aa",
        );
        run(&keeper, consts(), &[obs]).unwrap();

        let pool = keeper.get_pool(&bnb()).unwrap().unwrap();
        assert_eq!(pool.pool_units, 100 * ONE);
        let book = keeper.get_pool_staker(&bnb()).unwrap();
        assert_eq!(
            book.get(&Address::unchecked("bnb1stakeraddress")).unwrap().units,
            100 * ONE
        );
        // Vault booked the inbound.
        let vault = keeper.get_vault(&vault_pk()).unwrap().unwrap();
        assert_eq!(vault.inbound_tx_count, 1);
        assert_eq!(vault.balance_of(&bnb()), 1_100 * ONE);
    }

    #[test]
    fn garbage_memo_becomes_a_refund() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(1).unwrap();
        seed_vault(&keeper);

        let obs = observation("teleport:somewhere", vec![Coin::new(bnb(), 10 * ONE)], "aa");
        run(&keeper, consts(), &[obs]).unwrap();

        let events = keeper.iterate_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "refund");
        // The coins ride home minus gas.
        let items = keeper.get_txout(1).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].to_address, Address::unchecked("bnb1senderaddr000"));
    }

    #[test]
    fn failed_swap_refunds_instead_of_aborting() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(1).unwrap();
        seed_vault(&keeper);

        // No BTC pool exists, so this swap cannot price.
        let obs = observation("swap:BTC.BTC", vec![Coin::new(bnb(), 10 * ONE)], "aa");
        run(&keeper, consts(), &[obs]).unwrap();

        let events = keeper.iterate_events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "refund");
    }

    #[test]
    fn invalid_envelopes_are_dropped_silently() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(1).unwrap();
        let mut obs = observation("swap:BTC.BTC", vec![Coin::new(bnb(), ONE)], "aa");
        obs.tx.id = TxId::blank();
        run(&keeper, consts(), &[obs]).unwrap();
        assert!(keeper.iterate_events().unwrap().is_empty());
    }
}
