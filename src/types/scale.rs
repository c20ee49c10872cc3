//! Decimal to scaled-integer conversion.
//!
//! All book arithmetic runs on integers: prices are `u128` ticks and
//! quantities `u64` lots, where one tick is `10^-price_precision` and one lot
//! `10^-quantity_precision` of the display unit. Inputs that are not exact at
//! the configured precision are rejected rather than rounded.

use serde::{Deserialize, Serialize};

/// Sub-precision detection threshold. The smallest possible violation leaves
/// a fractional part of at least 0.1 tick, orders of magnitude above the
/// float representation noise of any realistic price.
const EXACTNESS_TOLERANCE: f64 = 1e-2;

/// Decimal precision pair for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scale {
    /// Number of decimal places carried by prices.
    pub price_precision: u32,
    /// Number of decimal places carried by quantities.
    pub quantity_precision: u32,
}

impl Scale {
    /// Create a scale from the two precisions.
    pub fn new(price_precision: u32, quantity_precision: u32) -> Self {
        Self {
            price_precision,
            quantity_precision,
        }
    }

    /// Convert a display price to ticks. `None` when the value is negative,
    /// non-finite or not exact at `price_precision` decimal places.
    pub fn price_to_ticks(&self, price: f64) -> Option<u128> {
        to_scaled(price, self.price_precision)
    }

    /// Convert a display quantity to lots. `None` when the value is not
    /// positive or not exact at `quantity_precision` decimal places.
    pub fn quantity_to_lots(&self, quantity: f64) -> Option<u64> {
        if quantity <= 0.0 {
            return None;
        }
        to_scaled(quantity, self.quantity_precision).and_then(|v| u64::try_from(v).ok())
    }

    /// Ticks back to a display price.
    pub fn ticks_to_price(&self, ticks: u128) -> f64 {
        ticks as f64 / 10f64.powi(self.price_precision as i32)
    }

    /// Lots back to a display quantity.
    pub fn lots_to_quantity(&self, lots: u64) -> f64 {
        lots as f64 / 10f64.powi(self.quantity_precision as i32)
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::new(2, 8)
    }
}

fn to_scaled(value: f64, precision: u32) -> Option<u128> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let scaled = value * 10f64.powi(precision as i32);
    let rounded = scaled.round();
    if (scaled - rounded).abs() > EXACTNESS_TOLERANCE {
        return None;
    }
    if rounded > u128::MAX as f64 {
        return None;
    }
    Some(rounded as u128)
}
