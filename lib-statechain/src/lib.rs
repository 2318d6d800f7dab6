//! Liquidity Network State Machine
//!
//! The message-dispatch core of a cross-chain liquidity network. External
//! chain observers feed observed transfers in; this crate validates them,
//! maintains constant-product liquidity pools, manages threshold-signed
//! vaults, and queues outbound transfers for the external signer process.
//!
//! The crate runs entirely inside the host consensus engine's block
//! callback: single-threaded, no suspension points, all state mutation
//! buffered per block and committed atomically at block end. Consensus
//! itself, chain observation, and threshold signing are external
//! collaborators reached through narrow interfaces (`Keeper`, `TssOracle`).
//!
//! Module map, leaves first:
//! - [`memo`] decodes transfer intent strings into typed actions
//! - [`pool`] pool entities and the pure swap/stake/withdraw math
//! - [`storage`] the keeper: typed access over an ordered keyed store
//! - [`events`] the append-only typed event log
//! - [`txout`] the outbound queue with per-vault fund accounting
//! - [`vault`], [`node_account`] vault and operator entities
//! - [`vault_manager`] keygen triggering, rotation, staged fund migration
//! - [`messages`], [`handlers`], [`dispatch`] the consensus-wire surface
//! - [`end_block`] per-block housekeeping (migration, reaping, rewards)

pub mod constants;
pub mod dispatch;
pub mod end_block;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod memo;
pub mod messages;
pub mod node_account;
pub mod pool;
pub mod slash;
pub mod storage;
pub mod tss;
pub mod txout;
pub mod vault;
pub mod vault_manager;

pub use constants::{Constants, CURRENT_VERSION};
pub use dispatch::{handle, Deps};
pub use errors::{codes, HandlerError, HandlerResult};
pub use events::{Event, EventPayload, EventStatus};
pub use memo::Memo;
pub use messages::Message;
pub use node_account::{NodeAccount, NodeStatus};
pub use pool::{Pool, PoolStaker, PoolStatus, StakerUnit};
pub use storage::{Keeper, SledKeeper, StoreError, StoreResult};
pub use tss::TssOracle;
pub use txout::TxOutItem;
pub use vault::{Vault, VaultKind, VaultStatus};
