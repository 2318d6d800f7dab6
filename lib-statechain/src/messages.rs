//! Consensus-Wire Messages
//!
//! Every message is one tagged variant of [`MessageBody`] inside a shared
//! envelope carrying the signer list; a single `dispatch` match routes
//! them, and handlers are free functions over the keeper rather than
//! methods on per-message receivers.
//!
//! `validate_basic` checks only the message's own shape (non-empty fields,
//! parseable amounts); everything that needs state lives in the handlers.

use serde::{Deserialize, Serialize};

use lib_types::{Address, Amount, Asset, BlockHeight, Bps, Chain, Coins, PubKey, Tx, TxId};

use crate::errors::{codes, HandlerError, HandlerResult};
use crate::pool::PoolStatus;

/// One external transfer as witnessed by a chain observer, tagged with the
/// vault it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedTx {
    pub tx: Tx,
    /// External-chain height the transfer confirmed at.
    pub block_height: BlockHeight,
    /// Key of the vault that received (or sent) the transfer.
    pub observed_pub_key: PubKey,
}

/// The kind-specific payload of a consensus message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    /// Admin toggle of a pool's lifecycle status.
    SetPoolData { asset: Asset, status: PoolStatus },
    /// Direct stake instruction (the memo path builds the same call).
    SetStakeData {
        asset: Asset,
        rune_amount: Amount,
        asset_amount: Amount,
        staker_address: Address,
        tx: Tx,
    },
    /// Withdraw liquidity.
    Unstake { asset: Asset, basis_points: Bps, tx: Tx },
    /// Swap the inbound coin into `target_asset`.
    Swap {
        target_asset: Asset,
        destination: Address,
        price_limit: Amount,
        tx: Tx,
    },
    /// Batch of inbound transfers witnessed on external chains.
    ObservedTxIn { txs: Vec<ObservedTx> },
    /// An outbound for inbound `in_tx_id` was witnessed leaving a vault.
    SetTxOutComplete { tx: Tx, in_tx_id: TxId },
    /// Post (or top up) a node operator's bond.
    Bond {
        node_address: Address,
        bond: Amount,
        bond_address: Address,
        tx: Tx,
    },
    /// Operator asks to leave the validator set.
    Leave { tx: Tx },
    /// Yggdrasil funding (`add_funds`) or return observed on chain.
    Yggdrasil {
        pub_key: PubKey,
        add_funds: bool,
        coins: Coins,
        tx: Tx,
    },
    /// Contribution to the protocol reserve.
    Reserve { contributor: Address, amount: Amount, tx: Tx },
    /// Admin top-up of pool balances (no units minted).
    Add {
        asset: Asset,
        rune_amount: Amount,
        asset_amount: Amount,
        tx: Tx,
    },
    /// Admin reversal of a prior transaction's pool effect.
    Errata { tx_id: TxId, chain: Chain },
    /// A keygen ceremony completed; materialize the new asgard vault.
    TssPool {
        pub_key: PubKey,
        members: Vec<PubKey>,
        keygen_height: BlockHeight,
    },
    /// A keysign ceremony failed; book slash points against the blamed.
    TssKeysignFail { height: BlockHeight, blame: Vec<PubKey> },
    /// Observed network-fee rate for a chain.
    NetworkFee { chain: Chain, fee: Amount },
}

impl MessageBody {
    /// Stable kind tag (logging, error codes).
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::SetPoolData { .. } => "set_pool_data",
            MessageBody::SetStakeData { .. } => "set_stake_data",
            MessageBody::Unstake { .. } => "unstake",
            MessageBody::Swap { .. } => "swap",
            MessageBody::ObservedTxIn { .. } => "observed_tx_in",
            MessageBody::SetTxOutComplete { .. } => "set_tx_out_complete",
            MessageBody::Bond { .. } => "bond",
            MessageBody::Leave { .. } => "leave",
            MessageBody::Yggdrasil { .. } => "yggdrasil",
            MessageBody::Reserve { .. } => "reserve",
            MessageBody::Add { .. } => "add",
            MessageBody::Errata { .. } => "errata",
            MessageBody::TssPool { .. } => "tss_pool",
            MessageBody::TssKeysignFail { .. } => "tss_keysign_fail",
            MessageBody::NetworkFee { .. } => "network_fee",
        }
    }
}

/// A signed consensus message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub signers: Vec<Address>,
    pub body: MessageBody,
}

impl Message {
    pub fn new(signer: Address, body: MessageBody) -> Self {
        Self { signers: vec![signer], body }
    }

    /// Stateless shape validation.
    pub fn validate_basic(&self) -> HandlerResult<()> {
        if self.signers.is_empty() || self.signers.iter().any(Address::is_empty) {
            return Err(HandlerError::validation(
                codes::INVALID_MESSAGE,
                "message has no usable signer",
            ));
        }
        let invalid = |reason: &str| -> HandlerResult<()> {
            Err(HandlerError::validation(codes::INVALID_MESSAGE, reason))
        };
        match &self.body {
            MessageBody::SetPoolData { asset, .. } => {
                if asset.is_rune() {
                    return invalid("the native asset has no pool");
                }
            }
            MessageBody::SetStakeData { asset, rune_amount, asset_amount, staker_address, tx } => {
                if asset.is_rune() {
                    return invalid("cannot stake the native asset against itself");
                }
                if *rune_amount == 0 && *asset_amount == 0 {
                    return invalid("stake carries no funds");
                }
                if staker_address.is_empty() {
                    return invalid("stake has no staker address");
                }
                if tx.id.is_blank() {
                    return invalid("stake has no originating tx");
                }
            }
            MessageBody::Unstake { asset, basis_points, tx } => {
                if asset.is_rune() {
                    return invalid("the native asset has no pool");
                }
                if *basis_points == 0 || *basis_points > lib_types::MAX_BASIS_POINTS {
                    return Err(HandlerError::validation(
                        codes::INVALID_BASIS_POINTS,
                        format!("withdraw basis points {basis_points} outside (0, 10000]"),
                    ));
                }
                if tx.from_address.is_empty() {
                    return invalid("unstake has no requesting address");
                }
            }
            MessageBody::Swap { target_asset, tx, .. } => {
                if tx.id.is_blank() {
                    return invalid("swap has no originating tx");
                }
                if tx.coins.is_empty() {
                    return invalid("swap carries no funds");
                }
                if tx.coins.iter().any(|c| c.asset == *target_asset) {
                    return invalid("swap source and target are the same asset");
                }
            }
            MessageBody::ObservedTxIn { txs } => {
                if txs.is_empty() {
                    return invalid("empty observation batch");
                }
                if txs.iter().any(|o| o.observed_pub_key.is_empty()) {
                    return invalid("observation without a vault key");
                }
            }
            MessageBody::SetTxOutComplete { tx, .. } => {
                if tx.id.is_blank() {
                    return invalid("outbound confirmation has no tx id");
                }
            }
            MessageBody::Bond { node_address, bond, bond_address, .. } => {
                if node_address.is_empty() || bond_address.is_empty() {
                    return invalid("bond addresses must be set");
                }
                if *bond == 0 {
                    return invalid("bond carries no funds");
                }
            }
            MessageBody::Leave { tx } => {
                if tx.from_address.is_empty() {
                    return invalid("leave has no requesting address");
                }
            }
            MessageBody::Yggdrasil { pub_key, coins, .. } => {
                if pub_key.is_empty() {
                    return invalid("yggdrasil message without a vault key");
                }
                if coins.is_empty() {
                    return invalid("yggdrasil message moves no coins");
                }
            }
            MessageBody::Reserve { contributor, amount, .. } => {
                if contributor.is_empty() {
                    return invalid("reserve contribution without a contributor");
                }
                if *amount == 0 {
                    return invalid("reserve contribution of zero");
                }
            }
            MessageBody::Add { asset, rune_amount, asset_amount, .. } => {
                if asset.is_rune() {
                    return invalid("the native asset has no pool");
                }
                if *rune_amount == 0 && *asset_amount == 0 {
                    return invalid("add carries no funds");
                }
            }
            MessageBody::Errata { tx_id, .. } => {
                if tx_id.is_blank() {
                    return invalid("errata without a target tx");
                }
            }
            MessageBody::TssPool { pub_key, members, .. } => {
                if pub_key.is_empty() {
                    return invalid("tss pool without a vault key");
                }
                if members.is_empty() {
                    return invalid("tss pool without members");
                }
            }
            MessageBody::TssKeysignFail { blame, .. } => {
                if blame.is_empty() {
                    return invalid("keysign failure blames nobody");
                }
            }
            MessageBody::NetworkFee { fee, .. } => {
                if *fee == 0 {
                    return invalid("network fee of zero");
                }
            }
        }
        Ok(())
    }
}
