//! Bond and Leave Handlers
//!
//! Bonding is the only action open to strangers: the first bond above the
//! configured minimum creates a Standby node account bound to the sender.
//! Leaving is the reverse path; the node is demoted out of the active
//! set, and once its yggdrasil vault is empty the bond goes home.

use lib_types::{Address, Amount, Asset, Chain, Tx};

use crate::constants::Constants;
use crate::errors::{codes, HandlerError, HandlerResult};
use crate::events::{self, BondType, EventPayload, EventStatus};
use crate::node_account::{NodeAccount, NodeStatus};
use crate::storage::Keeper;
use crate::txout::{self, TxOutItem};

pub fn bond(
    keeper: &dyn Keeper,
    constants: &Constants,
    node_address: &Address,
    amount: Amount,
    bond_address: &Address,
    tx: &Tx,
) -> HandlerResult<()> {
    if amount < constants.minimum_bond_in_rune {
        return Err(HandlerError::validation(
            codes::INSUFFICIENT_FUNDS,
            format!(
                "bond of {amount} is below the minimum of {}",
                constants.minimum_bond_in_rune
            ),
        ));
    }

    let mut node = match keeper.get_node_account(node_address)? {
        Some(node) => node,
        None => {
            let height = keeper.current_height()?;
            tracing::info!(node = %node_address, "first bond creates node account");
            let mut node =
                NodeAccount::new(node_address.clone(), lib_types::PubKey::empty(), height);
            node.status = NodeStatus::Standby;
            node.bond_address = bond_address.clone();
            node
        }
    };
    node.add_bond(amount);
    keeper.set_node_account(&node)?;

    tracing::info!(node = %node_address, amount, total = node.bond, "bond accepted");
    events::record(
        keeper,
        tx.clone(),
        EventStatus::Success,
        EventPayload::Bond { amount, bond_type: BondType::Paid },
    )?;
    Ok(())
}

pub fn leave(keeper: &dyn Keeper, constants: &Constants, tx: &Tx) -> HandlerResult<()> {
    let height = keeper.current_height()?;
    let mut node = keeper
        .iterate_node_accounts()?
        .into_iter()
        .find(|na| na.bond_address == tx.from_address)
        .ok_or_else(|| {
            HandlerError::validation(
                codes::INVALID_MESSAGE,
                format!("{} is not a bonded operator", tx.from_address),
            )
        })?;

    node.requested_to_leave = true;
    if node.is_active() {
        tracing::info!(node = %node.node_address, "active node leaving, demoting to standby");
        node.update_status(NodeStatus::Standby, height);
    }

    // With no yggdrasil float outstanding the bond can go home at once;
    // otherwise the refund waits for the vault to drain.
    let ygg_outstanding = keeper
        .get_vault(&node.pub_key)?
        .map(|v| v.has_funds())
        .unwrap_or(false);
    if !ygg_outstanding {
        refund_bond(keeper, constants, &mut node, tx)?;
    }
    keeper.set_node_account(&node)?;
    Ok(())
}

/// Return a node's bond to its bond address (native-chain outbound) and
/// record the `bond` event. No-op for an empty bond. The caller persists
/// the account.
pub fn refund_bond(
    keeper: &dyn Keeper,
    constants: &Constants,
    node: &mut NodeAccount,
    tx: &Tx,
) -> HandlerResult<()> {
    if node.bond == 0 {
        return Ok(());
    }
    let amount = node.bond;
    tracing::info!(node = %node.node_address, amount, "refunding bond");
    let item = TxOutItem::new(
        Chain::native(),
        node.bond_address.clone(),
        Asset::native_rune(),
        amount,
        tx.id.clone(),
        format!("refund:{}", tx.id),
    );
    txout::try_add_tx_out_item(keeper, constants, item)?;
    events::record(
        keeper,
        tx.clone(),
        EventStatus::Success,
        EventPayload::Bond { amount, bond_type: BondType::Returned },
    )?;
    node.bond = 0;
    Ok(())
}
