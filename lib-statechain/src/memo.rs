//! Memo Parser
//!
//! Every inbound external transfer carries a free-form memo string of the
//! shape `ACTION[:FIELD...]`. The first colon-delimited field names the
//! action (matched case-insensitively against a fixed alias table); the
//! remaining fields have a fixed per-action shape. Fields are not escaped -
//! addresses and tx ids never contain colons.
//!
//! Parsing is pure: it never queries state. Whether the named pool exists,
//! whether the node is known, etc. is the handlers' business.

use std::fmt;

use lib_types::{Address, Amount, Asset, Bps, Chain, TxId, MAX_BASIS_POINTS};

/// Why a memo failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoError {
    /// The memo as a whole has the wrong shape (empty, unknown action,
    /// missing mandatory fields).
    #[error("malformed memo: {0}")]
    Malformed(String),

    /// A specific field failed to parse.
    #[error("invalid memo field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl MemoError {
    fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField { field, reason: reason.into() }
    }
}

/// Typed intent decoded from a transfer memo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Memo {
    /// Provide liquidity. The asset may be omitted when the transfer's own
    /// coins identify the pool; a pool on an external chain additionally
    /// needs the staker's address on that chain.
    Stake { asset: Option<Asset>, address: Address },
    /// Withdraw liquidity, in basis points of the staker's units.
    Unstake { asset: Asset, basis_points: Bps },
    /// Swap the sent coin into `asset`. Empty destination means "back to
    /// sender"; a zero price limit means no protection.
    Swap { asset: Asset, destination: Address, price_limit: Amount },
    /// Signer attestation that an outbound for inbound `tx_id` left a vault.
    Outbound { tx_id: TxId },
    /// Signer attestation that a refund for inbound `tx_id` left a vault.
    Refund { tx_id: TxId },
    /// Post bond for the node account at `node_address`.
    Bond { node_address: Address },
    /// Begin leaving the validator set.
    Leave,
    /// Asgard is funding a per-node vault.
    YggdrasilFund,
    /// A per-node vault is returning funds to asgard.
    YggdrasilReturn,
    /// Contribute to the protocol reserve.
    Reserve,
    /// Top up pool balances without minting units.
    Add { asset: Asset },
    /// Gas reimbursement bookkeeping.
    Gas { asset: Option<Asset> },
    /// Staged fund migration from a retiring vault, scheduled at `height`.
    Migrate { block_height: u64 },
    /// Network unwind marker.
    Ragnarok { block_height: u64 },
}

impl Memo {
    /// Parse a memo string. Case-insensitive on the action; aliases and
    /// single-symbol shorthands are accepted (`stake` / `st` / `+`, ...).
    pub fn parse(raw: &str) -> Result<Memo, MemoError> {
        if raw.is_empty() {
            return Err(MemoError::Malformed("memo can't be empty".to_string()));
        }
        let parts: Vec<&str> = raw.split(':').collect();
        let action = parts[0].to_ascii_lowercase();

        match action.as_str() {
            "stake" | "st" | "+" => parse_stake(&parts),
            "unstake" | "withdraw" | "wd" | "-" => parse_unstake(&parts),
            "swap" | "s" | "=" => parse_swap(&parts),
            "outbound" => Ok(Memo::Outbound { tx_id: parse_tx_id(&parts)? }),
            "refund" => Ok(Memo::Refund { tx_id: parse_tx_id(&parts)? }),
            "bond" => parse_bond(&parts),
            "leave" => Ok(Memo::Leave),
            "yggdrasil+" => Ok(Memo::YggdrasilFund),
            "yggdrasil-" => Ok(Memo::YggdrasilReturn),
            "reserve" => Ok(Memo::Reserve),
            "add" | "a" | "%" => parse_add(&parts),
            "gas" | "g" | "$" => parse_gas(&parts),
            "migrate" => Ok(Memo::Migrate { block_height: parse_height(&parts)? }),
            "ragnarok" => Ok(Memo::Ragnarok { block_height: parse_height(&parts)? }),
            other => Err(MemoError::Malformed(format!("unknown action: {other}"))),
        }
    }
}

fn field_at<'a>(parts: &[&'a str], idx: usize) -> Option<&'a str> {
    parts.get(idx).copied().filter(|s| !s.is_empty())
}

fn parse_asset(s: &str) -> Result<Asset, MemoError> {
    Asset::new(s).map_err(|e| MemoError::field("asset", e.to_string()))
}

fn parse_stake(parts: &[&str]) -> Result<Memo, MemoError> {
    let asset = match field_at(parts, 1) {
        Some(s) => Some(parse_asset(s)?),
        None => None,
    };
    let address = match (&asset, field_at(parts, 2)) {
        (Some(a), Some(s)) => Address::new(&a.chain, s)
            .map_err(|e| MemoError::field("address", e.to_string()))?,
        // A pool on an external chain cannot be staked into blind: the
        // staker must name the address that owns the asset side.
        (Some(a), None) if !a.chain.is_native() => {
            return Err(MemoError::Malformed(
                "cannot stake into an external-chain pool without an associated address"
                    .to_string(),
            ))
        }
        _ => Address::empty(),
    };
    Ok(Memo::Stake { asset, address })
}

fn parse_unstake(parts: &[&str]) -> Result<Memo, MemoError> {
    let asset = match field_at(parts, 1) {
        Some(s) => parse_asset(s)?,
        None => return Err(MemoError::Malformed("unstake requires an asset".to_string())),
    };
    let basis_points = match field_at(parts, 2) {
        Some(s) => {
            let bp: Bps = s
                .parse()
                .map_err(|_| MemoError::field("basis_points", format!("not a number: {s}")))?;
            if bp == 0 || bp > MAX_BASIS_POINTS {
                return Err(MemoError::field(
                    "basis_points",
                    format!("{bp} outside (0, {MAX_BASIS_POINTS}]"),
                ));
            }
            bp
        }
        None => MAX_BASIS_POINTS,
    };
    Ok(Memo::Unstake { asset, basis_points })
}

fn parse_swap(parts: &[&str]) -> Result<Memo, MemoError> {
    let asset = match field_at(parts, 1) {
        Some(s) => parse_asset(s)?,
        None => return Err(MemoError::Malformed("swap requires a target asset".to_string())),
    };
    let destination = match field_at(parts, 2) {
        Some(s) => Address::new(&asset.chain, s)
            .map_err(|e| MemoError::field("destination", e.to_string()))?,
        None => Address::empty(),
    };
    let price_limit: Amount = match field_at(parts, 3) {
        Some(s) => s
            .parse()
            .map_err(|_| MemoError::field("price_limit", format!("not a number: {s}")))?,
        None => 0,
    };
    Ok(Memo::Swap { asset, destination, price_limit })
}

fn parse_tx_id(parts: &[&str]) -> Result<TxId, MemoError> {
    let raw = field_at(parts, 1)
        .ok_or_else(|| MemoError::Malformed("missing tx id".to_string()))?;
    TxId::new(raw).map_err(|e| MemoError::field("tx_id", e.to_string()))
}

fn parse_bond(parts: &[&str]) -> Result<Memo, MemoError> {
    let raw = field_at(parts, 1)
        .ok_or_else(|| MemoError::Malformed("bond requires a node address".to_string()))?;
    let node_address = Address::new(&Chain::native(), raw)
        .map_err(|e| MemoError::field("node_address", e.to_string()))?;
    Ok(Memo::Bond { node_address })
}

fn parse_add(parts: &[&str]) -> Result<Memo, MemoError> {
    let asset = match field_at(parts, 1) {
        Some(s) => parse_asset(s)?,
        None => return Err(MemoError::Malformed("add requires an asset".to_string())),
    };
    Ok(Memo::Add { asset })
}

fn parse_gas(parts: &[&str]) -> Result<Memo, MemoError> {
    let asset = match field_at(parts, 1) {
        Some(s) => Some(parse_asset(s)?),
        None => None,
    };
    Ok(Memo::Gas { asset })
}

fn parse_height(parts: &[&str]) -> Result<u64, MemoError> {
    let raw = field_at(parts, 1)
        .ok_or_else(|| MemoError::Malformed("missing block height".to_string()))?;
    raw.parse()
        .map_err(|_| MemoError::field("block_height", format!("not a number: {raw}")))
}

/// Canonical wire rendering. `parse(m.to_string()) == m` for every memo
/// this type can represent.
impl fmt::Display for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Memo::Stake { asset: Some(a), address } if !address.is_empty() => {
                write!(f, "stake:{a}:{address}")
            }
            Memo::Stake { asset: Some(a), .. } => write!(f, "stake:{a}"),
            Memo::Stake { asset: None, .. } => f.write_str("stake"),
            Memo::Unstake { asset, basis_points } => write!(f, "unstake:{asset}:{basis_points}"),
            Memo::Swap { asset, destination, price_limit } => {
                write!(f, "swap:{asset}:{destination}:{price_limit}")
            }
            Memo::Outbound { tx_id } => write!(f, "outbound:{tx_id}"),
            Memo::Refund { tx_id } => write!(f, "refund:{tx_id}"),
            Memo::Bond { node_address } => write!(f, "bond:{node_address}"),
            Memo::Leave => f.write_str("leave"),
            Memo::YggdrasilFund => f.write_str("yggdrasil+"),
            Memo::YggdrasilReturn => f.write_str("yggdrasil-"),
            Memo::Reserve => f.write_str("reserve"),
            Memo::Add { asset } => write!(f, "add:{asset}"),
            Memo::Gas { asset: Some(a) } => write!(f, "gas:{a}"),
            Memo::Gas { asset: None } => f.write_str("gas"),
            Memo::Migrate { block_height } => write!(f, "migrate:{block_height}"),
            Memo::Ragnarok { block_height } => write!(f, "ragnarok:{block_height}"),
        }
    }
}
