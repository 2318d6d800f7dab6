//! Pool Flow Integration Tests
//!
//! Drives stake, swap, and unstake through the full dispatch path
//! (observed inbound -> memo -> handler) and checks the accounting
//! invariants that must hold after every block:
//!
//! - pool units always equal the sum of staker units
//! - a priced pool has both balances positive; an empty one has neither
//! - every non-noop inbound produces exactly one event

use lib_statechain::dispatch::{handle, Deps};
use lib_statechain::end_block::end_block;
use lib_statechain::events::EventPayload;
use lib_statechain::messages::{Message, MessageBody, ObservedTx};
use lib_statechain::node_account::{NodeAccount, NodeStatus};
use lib_statechain::pool::PoolStatus;
use lib_statechain::storage::{Keeper, SledKeeper};
use lib_statechain::vault::{Vault, VaultKind, VaultStatus};
use lib_types::{Address, Asset, Chain, Coin, Coins, PubKey, Tx, TxId, ONE};

fn bnb() -> Asset {
    Asset::new("BNB.BNB").unwrap()
}

fn btc() -> Asset {
    Asset::new("BTC.BTC").unwrap()
}

fn signer() -> Address {
    Address::unchecked("node1operator000")
}

fn vault_pk() -> PubKey {
    PubKey::new("asgardpk")
}

fn random_tx_id() -> TxId {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: Vec<String> = (0..32).map(|_| format!("{:02x}", rng.gen::<u8>())).collect();
    TxId::new(&bytes.join("")).unwrap()
}

/// A store with one active node (the signer) and one deep asgard vault.
fn setup() -> SledKeeper {
    let keeper = SledKeeper::open_temporary().unwrap();
    keeper.begin_block(1).unwrap();
    let mut node = NodeAccount::new(signer(), PubKey::new("nodepk"), 1);
    node.update_status(NodeStatus::Active, 1);
    keeper.set_node_account(&node).unwrap();
    let mut vault = Vault::new(vault_pk(), VaultStatus::Active, VaultKind::Asgard, 1);
    vault.credit(&bnb(), 100_000 * ONE);
    vault.credit(&btc(), 100_000 * ONE);
    keeper.set_vault(&vault).unwrap();
    keeper.commit_block().unwrap();
    keeper
}

fn observe(keeper: &SledKeeper, memo: &str, coins: Vec<Coin>, from: &str) -> TxId {
    let tx_id = random_tx_id();
    let tx = Tx::new(
        tx_id.clone(),
        Chain::new("BNB").unwrap(),
        Address::unchecked(from),
        Address::unchecked("bnb1vaultaddr0000"),
        Coins::from_vec(coins),
        Coins::new(),
        memo.to_string(),
    );
    let msg = Message::new(
        signer(),
        MessageBody::ObservedTxIn {
            txs: vec![ObservedTx { tx, block_height: 1, observed_pub_key: vault_pk() }],
        },
    );
    handle(&Deps::new(keeper), &msg).unwrap();
    tx_id
}

fn run_block<F: FnOnce(&SledKeeper)>(keeper: &SledKeeper, height: u64, body: F) {
    keeper.begin_block(height).unwrap();
    body(keeper);
    end_block(keeper).unwrap();
    keeper.commit_block().unwrap();
}

/// Stake-created pools open in Bootstrap; list them the way an admin
/// would before anything swaps against them.
fn enable_pool(keeper: &SledKeeper, height: u64, asset: &Asset) {
    run_block(keeper, height, |k| {
        let msg = Message::new(
            signer(),
            MessageBody::SetPoolData { asset: asset.clone(), status: PoolStatus::Enabled },
        );
        handle(&Deps::new(k), &msg).unwrap();
    });
}

fn assert_unit_invariant(keeper: &SledKeeper) {
    for pool in keeper.iterate_pools().unwrap() {
        let book = keeper.get_pool_staker(&pool.asset).unwrap();
        let staker_sum: u128 = book.stakers.iter().map(|s| s.units).sum();
        assert_eq!(pool.pool_units, book.total_units, "pool {} unit ledger drift", pool.asset);
        assert_eq!(book.total_units, staker_sum, "pool {} staker sum drift", pool.asset);
        if pool.pool_units > 0 {
            assert_eq!(
                pool.balance_rune > 0,
                pool.balance_asset > 0,
                "pool {} has a one-sided balance",
                pool.asset
            );
        }
    }
}

#[test]
fn first_symmetric_stake_mints_its_size() {
    let keeper = setup();
    run_block(&keeper, 2, |k| {
        observe(
            k,
            "stake:BNB.BNB:bnb1stakeraddress",
            vec![Coin::new(Asset::native_rune(), 100 * ONE), Coin::new(bnb(), 100 * ONE)],
            "bnb1stakeraddress",
        );
    });

    let pool = keeper.get_pool(&bnb()).unwrap().unwrap();
    assert_eq!(pool.balance_rune, 100 * ONE);
    assert_eq!(pool.balance_asset, 100 * ONE);
    assert_eq!(pool.pool_units, 100 * ONE);
    assert_eq!(pool.status, PoolStatus::Bootstrap, "new pools wait for admin listing");
    let book = keeper.get_pool_staker(&bnb()).unwrap();
    assert_eq!(book.get(&Address::unchecked("bnb1stakeraddress")).unwrap().units, 100 * ONE);

    let stakes: Vec<_> = keeper
        .iterate_events()
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == "stake")
        .collect();
    assert_eq!(stakes.len(), 1);
    assert_unit_invariant(&keeper);
}

#[test]
fn asymmetric_second_stake_matches_the_reference_vector() {
    let keeper = setup();
    run_block(&keeper, 2, |k| {
        observe(
            k,
            "stake:BNB.BNB:bnb1firststaker0",
            vec![Coin::new(Asset::native_rune(), 500 * ONE), Coin::new(bnb(), 500 * ONE)],
            "bnb1firststaker0",
        );
    });
    run_block(&keeper, 3, |k| {
        observe(
            k,
            "stake:BNB.BNB:bnb1secondstaker",
            vec![Coin::new(Asset::native_rune(), 345 * ONE), Coin::new(bnb(), 234 * ONE)],
            "bnb1secondstaker",
        );
    });

    let pool = keeper.get_pool(&bnb()).unwrap().unwrap();
    assert_eq!(pool.pool_units, 78_701_684_859);
    let book = keeper.get_pool_staker(&bnb()).unwrap();
    assert_eq!(
        book.get(&Address::unchecked("bnb1secondstaker")).unwrap().units,
        28_701_684_859
    );
    assert_unit_invariant(&keeper);
}

#[test]
fn rune_to_asset_swap_pays_the_reference_output() {
    let keeper = setup();
    run_block(&keeper, 2, |k| {
        observe(
            k,
            "stake:BNB.BNB:bnb1stakeraddress",
            vec![Coin::new(Asset::native_rune(), 100 * ONE), Coin::new(bnb(), 100 * ONE)],
            "bnb1stakeraddress",
        );
    });
    enable_pool(&keeper, 3, &bnb());
    run_block(&keeper, 4, |k| {
        observe(
            k,
            "swap:BNB.BNB",
            vec![Coin::new(Asset::native_rune(), 10 * ONE)],
            "bnb1swapperaddr0",
        );
    });

    let pool = keeper.get_pool(&bnb()).unwrap().unwrap();
    assert_eq!(pool.balance_rune, 110 * ONE);
    assert_eq!(pool.balance_asset, 100 * ONE - 826_446_280);

    let items = keeper.get_txout(4).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].to_address, Address::unchecked("bnb1swapperaddr0"));

    let swap_event = keeper
        .iterate_events()
        .unwrap()
        .into_iter()
        .find(|e| e.event_type == "swap")
        .unwrap();
    match swap_event.payload {
        EventPayload::Swap { trade_slip, liquidity_fee, .. } => {
            assert_eq!(trade_slip, 909);
            assert_eq!(liquidity_fee, 82_644_628);
        }
        other => panic!("unexpected payload {other:?}"),
    }
    assert_unit_invariant(&keeper);
}

#[test]
fn double_swap_decomposes_through_both_pools() {
    let keeper = setup();
    run_block(&keeper, 2, |k| {
        observe(
            k,
            "stake:BNB.BNB:bnb1stakeraddress",
            vec![Coin::new(Asset::native_rune(), 100 * ONE), Coin::new(bnb(), 100 * ONE)],
            "bnb1stakeraddress",
        );
        observe(
            k,
            "stake:BTC.BTC:bnb1stakeraddress",
            vec![Coin::new(Asset::native_rune(), 100 * ONE), Coin::new(btc(), 100 * ONE)],
            "bnb1stakeraddress",
        );
    });
    enable_pool(&keeper, 3, &bnb());
    enable_pool(&keeper, 4, &btc());
    run_block(&keeper, 5, |k| {
        observe(k, "swap:BTC.BTC", vec![Coin::new(bnb(), 10 * ONE)], "bnb1swapperaddr0");
    });

    // Leg 1 sold 10 BNB into the BNB pool for 826_446_280 RUNE.
    let bnb_pool = keeper.get_pool(&bnb()).unwrap().unwrap();
    assert_eq!(bnb_pool.balance_asset, 110 * ONE);
    assert_eq!(bnb_pool.balance_rune, 100 * ONE - 826_446_280);
    // Leg 2 pushed that RUNE through the BTC pool.
    let btc_pool = keeper.get_pool(&btc()).unwrap().unwrap();
    assert_eq!(btc_pool.balance_rune, 100 * ONE + 826_446_280);
    assert!(btc_pool.balance_asset < 100 * ONE);

    let swap_event = keeper
        .iterate_events()
        .unwrap()
        .into_iter()
        .find(|e| e.event_type == "swap")
        .unwrap();
    match swap_event.payload {
        EventPayload::Swap { trade_slip, liquidity_fee_in_rune, .. } => {
            assert!(trade_slip > 909, "slip must combine both legs");
            assert!(liquidity_fee_in_rune > 0);
        }
        other => panic!("unexpected payload {other:?}"),
    }
    assert_unit_invariant(&keeper);
}

#[test]
fn stake_then_full_unstake_round_trips_within_a_base_unit() {
    let keeper = setup();
    let rune_in = 123 * ONE + 7;
    let asset_in = 45 * ONE + 13;
    run_block(&keeper, 2, |k| {
        observe(
            k,
            "stake:BNB.BNB:bnb1stakeraddress",
            vec![Coin::new(Asset::native_rune(), rune_in), Coin::new(bnb(), asset_in)],
            "bnb1stakeraddress",
        );
    });
    run_block(&keeper, 3, |k| {
        observe(
            k,
            "unstake:BNB.BNB:10000",
            vec![Coin::new(bnb(), 1)],
            "bnb1stakeraddress",
        );
    });

    let items = keeper.get_txout(3).unwrap();
    let rune_leg = items.iter().find(|i| i.coin.asset.is_rune()).unwrap();
    let asset_leg = items.iter().find(|i| !i.coin.asset.is_rune()).unwrap();
    assert!(rune_in - rune_leg.coin.amount <= 1);
    // The asset leg pays the outbound network fee out of the amount.
    let fee = 37_500;
    assert!(asset_in + 1 - asset_leg.coin.amount - fee <= 2);

    let pool = keeper.get_pool(&bnb()).unwrap().unwrap();
    assert_eq!(pool.pool_units, 0);
    assert!(keeper.get_pool_staker(&bnb()).unwrap().is_empty());
    assert_unit_invariant(&keeper);
}

#[test]
fn boundary_failures_refund_instead_of_mutating() {
    let keeper = setup();
    run_block(&keeper, 2, |k| {
        observe(
            k,
            "stake:BNB.BNB:bnb1stakeraddress",
            vec![Coin::new(Asset::native_rune(), 100 * ONE), Coin::new(bnb(), 100 * ONE)],
            "bnb1stakeraddress",
        );
    });

    enable_pool(&keeper, 3, &bnb());
    run_block(&keeper, 4, |k| {
        // One-sided stake into a fresh pool: "total asset is zero".
        observe(
            k,
            "stake:BTC.BTC:bnb1stakeraddress",
            vec![Coin::new(Asset::native_rune(), 100 * ONE)],
            "bnb1stakeraddress",
        );
        // Unparseable basis points never reach the handler.
        observe(k, "unstake:BNB.BNB:0", vec![Coin::new(bnb(), 1)], "bnb1stakeraddress");
        // Swap with a price limit the pool cannot meet.
        observe(
            k,
            &format!("swap:BNB.BNB::{}", 9 * ONE),
            vec![Coin::new(Asset::native_rune(), 10 * ONE)],
            "bnb1swapperaddr0",
        );
    });

    let refunds: Vec<_> = keeper
        .iterate_events()
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == "refund")
        .collect();
    assert_eq!(refunds.len(), 3);

    // Nothing moved: the BNB pool is exactly as staked, no BTC pool rose.
    let pool = keeper.get_pool(&bnb()).unwrap().unwrap();
    assert_eq!(pool.balance_rune, 100 * ONE);
    assert_eq!(pool.balance_asset, 100 * ONE);
    let btc_pool = keeper.get_pool(&btc()).unwrap();
    assert!(btc_pool.is_none() || btc_pool.unwrap().pool_units == 0);
    assert_unit_invariant(&keeper);
}

#[test]
fn every_inbound_produces_exactly_one_event() {
    let keeper = setup();
    run_block(&keeper, 2, |k| {
        observe(
            k,
            "stake:BNB.BNB:bnb1stakeraddress",
            vec![Coin::new(Asset::native_rune(), 100 * ONE), Coin::new(bnb(), 100 * ONE)],
            "bnb1stakeraddress",
        );
    });
    enable_pool(&keeper, 3, &bnb());
    run_block(&keeper, 4, |k| {
        observe(
            k,
            "swap:RUNE",
            vec![Coin::new(bnb(), ONE)],
            "bnb1swapperaddr0",
        );
        observe(k, "not-a-memo", vec![Coin::new(bnb(), ONE)], "bnb1swapperaddr0");
    });

    // One event per inbound in each block that carried inbounds: the
    // stake at height 2, then the swap and the refund at height 4.
    let events = keeper.iterate_events().unwrap();
    let at_2: Vec<_> = events.iter().filter(|e| e.height == 2).collect();
    assert_eq!(at_2.len(), 1);
    assert_eq!(at_2[0].event_type, "stake");
    let mut at_4: Vec<_> = events
        .iter()
        .filter(|e| e.height == 4)
        .map(|e| e.event_type.as_str())
        .collect();
    at_4.sort();
    assert_eq!(at_4, vec!["refund", "swap"]);
}
