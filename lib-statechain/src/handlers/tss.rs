//! TSS Completion Handlers
//!
//! The signer fleet reports ceremony results back over the consensus
//! wire. A successful keygen materializes a fresh Active asgard vault
//! (rotating predecessors out); a keysign failure books slash points
//! against the blamed nodes.

use lib_types::{BlockHeight, PubKey};

use crate::constants::Constants;
use crate::errors::HandlerResult;
use crate::storage::Keeper;
use crate::vault::{Vault, VaultKind, VaultStatus};
use crate::vault_manager;

pub fn tss_pool(
    keeper: &dyn Keeper,
    pub_key: PubKey,
    members: Vec<PubKey>,
    keygen_height: BlockHeight,
) -> HandlerResult<()> {
    let height = keeper.current_height()?;
    let mut vault = Vault::new(pub_key, VaultStatus::Active, VaultKind::Asgard, height);
    vault.set_membership(members);
    vault_manager::rotate_vault(keeper, vault)?;
    // The ceremony that produced this key is settled.
    keeper.delete_keygens(keygen_height)?;
    Ok(())
}

pub fn tss_keysign_fail(
    keeper: &dyn Keeper,
    constants: &Constants,
    blame: &[PubKey],
) -> HandlerResult<()> {
    for pub_key in blame {
        let Some(mut node) = keeper.get_node_account_by_pubkey(pub_key)? else {
            tracing::warn!(%pub_key, "keysign blame names an unknown node");
            continue;
        };
        node.slash_points = node
            .slash_points
            .saturating_add(constants.keysign_fail_slash_points);
        tracing::info!(
            node = %node.node_address,
            slash_points = node.slash_points,
            "keysign failure booked"
        );
        keeper.set_node_account(&node)?;
    }
    Ok(())
}
