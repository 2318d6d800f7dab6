//! Pool Math
//!
//! Pure functions over amounts; no state access. All multiplication is
//! checked; a u128 overflow here means balances have left the economically
//! meaningful range and the caller must treat it as an invariant violation,
//! not clamp it. Every division rounds toward zero.

use lib_types::{Amount, Bps, MAX_BASIS_POINTS};

/// Errors from the pure pool math.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("swap input is zero")]
    ZeroInput,

    #[error("pool has no liquidity")]
    EmptyPool,

    #[error("total RUNE in the pool is zero")]
    ZeroRuneSide,

    #[error("total asset in the pool is zero")]
    ZeroAssetSide,
}

pub type MathResult<T> = Result<T, MathError>;

/// What a single-leg swap does, before it is applied to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    /// Units of the target asset leaving the pool.
    pub output: Amount,
    /// Liquidity fee, in target-asset units.
    pub liquidity_fee: Amount,
    /// Fraction of the source reserve the trade consumed, in basis points.
    pub trade_slip: Bps,
}

/// Price one leg of a swap: input `x` against source reserve `big_x` and
/// target reserve `big_y`.
///
/// ```text
/// output = (x · X · Y) / (x + X)²
/// fee    = (x² · Y)    / (x + X)²
/// slip   = 10_000 · x  / (x + X)
/// ```
pub fn swap(x: Amount, big_x: Amount, big_y: Amount) -> MathResult<SwapOutcome> {
    if x == 0 {
        return Err(MathError::ZeroInput);
    }
    if big_x == 0 || big_y == 0 {
        return Err(MathError::EmptyPool);
    }

    let x_plus = x.checked_add(big_x).ok_or(MathError::Overflow)?;
    let denom = x_plus.checked_mul(x_plus).ok_or(MathError::Overflow)?;

    let output = x
        .checked_mul(big_x)
        .and_then(|v| v.checked_mul(big_y))
        .ok_or(MathError::Overflow)?
        / denom;

    let liquidity_fee = x
        .checked_mul(x)
        .and_then(|v| v.checked_mul(big_y))
        .ok_or(MathError::Overflow)?
        / denom;

    let trade_slip = (x
        .checked_mul(MAX_BASIS_POINTS as Amount)
        .ok_or(MathError::Overflow)?
        / x_plus) as Bps;

    Ok(SwapOutcome { output, liquidity_fee, trade_slip })
}

/// Units minted for a stake of (`stake_rune`, `stake_asset`) into a pool
/// currently holding (`pool_rune`, `pool_asset`) with `old_units` issued.
///
/// With `X`/`Y` the rune/asset totals *after* the stake lands:
///
/// ```text
/// staker_units = ((X + Y) · (r·Y + X·a)) / (4·X·Y)
/// ```
///
/// The very first symmetric stake of `(v, v)` therefore mints exactly `v`
/// units. A one-sided stake into an empty pool cannot be priced and is
/// rejected.
///
/// Returns `(new_pool_units, staker_units)`.
pub fn calculate_pool_units(
    old_units: Amount,
    pool_rune: Amount,
    pool_asset: Amount,
    stake_rune: Amount,
    stake_asset: Amount,
) -> MathResult<(Amount, Amount)> {
    let big_x = pool_rune.checked_add(stake_rune).ok_or(MathError::Overflow)?;
    let big_y = pool_asset.checked_add(stake_asset).ok_or(MathError::Overflow)?;
    if big_x == 0 {
        return Err(MathError::ZeroRuneSide);
    }
    if big_y == 0 {
        return Err(MathError::ZeroAssetSide);
    }

    let cross = stake_rune
        .checked_mul(big_y)
        .ok_or(MathError::Overflow)?
        .checked_add(big_x.checked_mul(stake_asset).ok_or(MathError::Overflow)?)
        .ok_or(MathError::Overflow)?;
    let numer = big_x
        .checked_add(big_y)
        .ok_or(MathError::Overflow)?
        .checked_mul(cross)
        .ok_or(MathError::Overflow)?;
    let denom = big_x
        .checked_mul(big_y)
        .and_then(|v| v.checked_mul(4))
        .ok_or(MathError::Overflow)?;

    let staker_units = numer / denom;
    let new_pool_units = old_units.checked_add(staker_units).ok_or(MathError::Overflow)?;
    Ok((new_pool_units, staker_units))
}

/// What a proportional withdrawal returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawOutcome {
    pub withdraw_units: Amount,
    pub rune_out: Amount,
    pub asset_out: Amount,
}

/// Withdraw `basis_points` of a staker's `staker_units` from a pool with
/// `pool_units` total units and the given balances. Both payouts round
/// toward zero; the dust stays in the pool.
pub fn calculate_withdraw(
    pool_units: Amount,
    balance_rune: Amount,
    balance_asset: Amount,
    staker_units: Amount,
    basis_points: Bps,
) -> MathResult<WithdrawOutcome> {
    if pool_units == 0 {
        return Err(MathError::EmptyPool);
    }
    let withdraw_units = staker_units
        .checked_mul(basis_points as Amount)
        .ok_or(MathError::Overflow)?
        / MAX_BASIS_POINTS as Amount;
    let rune_out = balance_rune
        .checked_mul(withdraw_units)
        .ok_or(MathError::Overflow)?
        / pool_units;
    let asset_out = balance_asset
        .checked_mul(withdraw_units)
        .ok_or(MathError::Overflow)?
        / pool_units;
    Ok(WithdrawOutcome { withdraw_units, rune_out, asset_out })
}

/// Minimum-stake guard.
///
/// Small pools accept anything; once a pool has more than 100 stakers the
/// floor is the average stake scaled by how far past the configured
/// interval the staker count has grown (rounded up), which squeezes out
/// dust entries as pools get crowded.
///
/// Returns the minimum unit count `new_units` must meet.
pub fn minimum_stake_units(staker_count: u64, total_units: Amount, interval: u64) -> Amount {
    if staker_count <= 100 || interval == 0 {
        return 0;
    }
    let avg = total_units / staker_count as Amount;
    let multiplier = staker_count.div_ceil(interval) as Amount;
    avg.saturating_mul(multiplier)
}
