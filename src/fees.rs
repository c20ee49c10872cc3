//! Maker/taker fee schedule.
//!
//! Fees are expressed in basis points (1 bps = 0.01%) and applied to the
//! integer notional of a fill (price in ticks times quantity in lots).
//! Negative maker fees are rebates. All arithmetic is scaled-integer; no
//! binary floating point participates.

use serde::{Deserialize, Serialize};

/// Basis points per unit (100% = 10_000 bps).
const BPS_DENOMINATOR: i128 = 10_000;

/// Configurable maker/taker fee rates for one book.
///
/// # Examples
///
/// ```
/// use matchbook_rs::FeeSchedule;
///
/// // 2 bps maker rebate, 5 bps taker fee.
/// let fees = FeeSchedule::new(-2, 5);
/// assert_eq!(fees.maker_fee(10_000_000), -2_000);
/// assert_eq!(fees.taker_fee(10_000_000), 5_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Maker fee in basis points. Negative values are rebates.
    pub maker_fee_bps: i32,
    /// Taker fee in basis points.
    pub taker_fee_bps: i32,
}

impl FeeSchedule {
    /// Create a schedule from the two rates.
    pub fn new(maker_fee_bps: i32, taker_fee_bps: i32) -> Self {
        Self {
            maker_fee_bps,
            taker_fee_bps,
        }
    }

    /// A schedule charging nothing on either side.
    pub fn zero() -> Self {
        Self::new(0, 0)
    }

    /// A schedule with a maker rebate. `maker_rebate_bps` is given as a
    /// positive number and negated.
    pub fn with_maker_rebate(maker_rebate_bps: i32, taker_fee_bps: i32) -> Self {
        Self::new(-maker_rebate_bps.abs(), taker_fee_bps)
    }

    /// True when both rates are zero.
    pub fn is_zero(&self) -> bool {
        self.maker_fee_bps == 0 && self.taker_fee_bps == 0
    }

    /// Fee charged to the maker for a fill of the given notional.
    #[inline]
    pub fn maker_fee(&self, notional: u128) -> i128 {
        apply_bps(notional, self.maker_fee_bps)
    }

    /// Fee charged to the taker for a fill of the given notional.
    #[inline]
    pub fn taker_fee(&self, notional: u128) -> i128 {
        apply_bps(notional, self.taker_fee_bps)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::zero()
    }
}

#[inline]
fn apply_bps(notional: u128, bps: i32) -> i128 {
    // bps is tiny, so the product only overflows for absurd notionals;
    // saturate rather than wrap in that case.
    (notional as i128)
        .checked_mul(bps as i128)
        .map(|product| product / BPS_DENOMINATOR)
        .unwrap_or(if bps < 0 { i128::MIN } else { i128::MAX })
}
