//! Chains and Assets
//!
//! An asset is identified by the chain it lives on and its symbol
//! (`BNB.BNB`, `BTC.BTC`, `BNB.TWT-8C2`). The native settlement asset RUNE
//! is chain-less on the wire (`RUNE`) and is the unit every pool prices
//! against. Identifiers are normalized to uppercase at construction so that
//! derived equality is case-insensitive equality.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{TypeError, TypeResult};

/// Identifier of an external chain (or the native chain).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Chain(String);

const NATIVE_CHAIN: &str = "RUNE";

impl Chain {
    /// Parse a chain identifier: 1-10 ASCII alphanumerics, any case.
    pub fn new(s: &str) -> TypeResult<Self> {
        if s.is_empty() || s.len() > 10 || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TypeError::InvalidChain(s.to_string()));
        }
        Ok(Self(s.to_ascii_uppercase()))
    }

    /// The chain of the native settlement asset.
    pub fn native() -> Self {
        Self(NATIVE_CHAIN.to_string())
    }

    pub fn is_native(&self) -> bool {
        self.0 == NATIVE_CHAIN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chain({})", self.0)
    }
}

/// A tradable asset: the chain it lives on, its full symbol, and the ticker
/// (symbol up to the first `-`, which separates issuance suffixes).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Asset {
    pub chain: Chain,
    pub symbol: String,
    pub ticker: String,
}

impl Asset {
    /// Parse an asset from its wire form.
    ///
    /// Accepted shapes:
    /// - `RUNE`: the native settlement asset
    /// - `CHAIN.SYMBOL`: an external-chain asset, e.g. `BNB.TWT-8C2`
    /// - `SYMBOL`: shorthand resolving to the symbol's own chain when the
    ///   symbol names a chain asset (`BNB` means `BNB.BNB`)
    pub fn new(s: &str) -> TypeResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TypeError::InvalidAsset(s.to_string()));
        }
        if s.eq_ignore_ascii_case(NATIVE_CHAIN) {
            return Ok(Self::native_rune());
        }
        let (chain, symbol) = match s.split_once('.') {
            Some((c, sym)) => (Chain::new(c)?, sym),
            None => (Chain::new(s)?, s),
        };
        if symbol.is_empty()
            || symbol.len() > 20
            || !symbol
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(TypeError::InvalidAsset(s.to_string()));
        }
        let symbol = symbol.to_ascii_uppercase();
        let ticker = symbol.split('-').next().unwrap_or(&symbol).to_string();
        Ok(Self { chain, symbol, ticker })
    }

    /// The native settlement asset.
    pub fn native_rune() -> Self {
        Self {
            chain: Chain::native(),
            symbol: NATIVE_CHAIN.to_string(),
            ticker: NATIVE_CHAIN.to_string(),
        }
    }

    pub fn is_rune(&self) -> bool {
        self.chain.is_native() && self.ticker == NATIVE_CHAIN
    }

    pub fn is_empty(&self) -> bool {
        self.symbol.is_empty()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_rune() {
            f.write_str(NATIVE_CHAIN)
        } else {
            write!(f, "{}.{}", self.chain, self.symbol)
        }
    }
}

impl fmt::Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Asset({})", self)
    }
}
