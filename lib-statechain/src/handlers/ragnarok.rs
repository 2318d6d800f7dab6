//! Ragnarok Handler
//!
//! The network unwind marker. Recording it suspends every pool (no new
//! swaps or stakes); the funds themselves ride home on the ordinary
//! vault-retirement migration machinery as vaults wind down.

use lib_types::Tx;

use crate::errors::HandlerResult;
use crate::events::{self, EventPayload, EventStatus};
use crate::pool::PoolStatus;
use crate::storage::Keeper;

pub fn run(keeper: &dyn Keeper, tx: &Tx) -> HandlerResult<()> {
    let height = keeper.current_height()?;
    tracing::warn!(height, "ragnarok: suspending all pools");
    keeper.set_ragnarok_height(height)?;
    for mut pool in keeper.iterate_pools()? {
        if pool.status == PoolStatus::Suspended {
            continue;
        }
        pool.status = PoolStatus::Suspended;
        keeper.set_pool(&pool)?;
        events::record(
            keeper,
            tx.clone(),
            EventStatus::Success,
            EventPayload::Pool { pool: pool.asset.clone(), status: PoolStatus::Suspended },
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Pool;
    use crate::storage::SledKeeper;
    use lib_types::{Address, Asset, Chain, Coins, TxId};

    #[test]
    fn ragnarok_suspends_every_pool_and_marks_the_height() {
        let keeper = SledKeeper::open_temporary().unwrap();
        keeper.begin_block(9_000).unwrap();
        keeper.set_pool(&Pool::new(Asset::new("BNB.BNB").unwrap())).unwrap();
        keeper.set_pool(&Pool::new(Asset::new("BTC.BTC").unwrap())).unwrap();

        let tx = Tx::new(
            TxId::new(&"ee".repeat(32)).unwrap(),
            Chain::native(),
            Address::unchecked("native1admin0000"),
            Address::unchecked("native1module000"),
            Coins::new(),
            Coins::new(),
            "ragnarok:9000".to_string(),
        );
        run(&keeper, &tx).unwrap();

        assert_eq!(keeper.get_ragnarok_height().unwrap(), Some(9_000));
        for pool in keeper.iterate_pools().unwrap() {
            assert_eq!(pool.status, PoolStatus::Suspended);
        }
        assert_eq!(keeper.iterate_events().unwrap().len(), 2);
    }
}
