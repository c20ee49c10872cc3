//! The matching pass.
//!
//! Pure over its inputs: given the taker's side, optional limit and
//! quantity, `execute` drains the opposing side book head-first and reports
//! what happened. Time-in-force handling, fee attribution and event
//! emission stay with the book so the matcher can be reasoned about in
//! isolation.
//!
//! Fills always execute at the maker's resting price. For a buy taker that
//! means paying at most the limit and often less; the price improvement is
//! implicit in the algorithm rather than a switched-on feature.

use super::level::FrontFill;
use super::side_book::SideBook;
use crate::types::Side;
use tracing::trace;

/// One maker fill produced by a matching pass, in arrival order.
#[derive(Debug, Clone)]
pub(crate) struct Fill {
    /// The resting order that was hit.
    pub maker_order_id: crate::types::OrderId,
    /// Its owner.
    pub maker_user_id: crate::types::UserId,
    /// Execution price: the maker's resting price, in ticks.
    pub price: u128,
    /// Filled quantity in lots.
    pub quantity: u64,
    /// Maker quantity left after this fill.
    pub maker_remaining: u64,
    /// The maker completed and left its level.
    pub maker_done: bool,
}

/// Post-drain state of a level the pass touched.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LevelTouch {
    /// The level's price in ticks.
    pub price: u128,
    /// The level emptied and was removed from its side book.
    pub removed: bool,
    /// Displayed quantity remaining at the level.
    pub visible_quantity: u64,
    /// Orders remaining at the level.
    pub order_count: usize,
}

/// Everything a matching pass produced.
#[derive(Debug, Clone, Default)]
pub(crate) struct MatchOutcome {
    /// Fills in execution order.
    pub fills: Vec<Fill>,
    /// Taker quantity left unfilled.
    pub remaining: u64,
    /// Touched levels in matching order, final state each.
    pub levels: Vec<LevelTouch>,
}

impl MatchOutcome {
    /// Total quantity executed across all fills.
    pub fn executed_quantity(&self) -> u64 {
        self.fills.iter().map(|f| f.quantity).sum()
    }
}

/// Whether a taker at `limit` crosses a level at `level_price`.
/// `None` is the market-order case and crosses unconditionally.
#[inline]
pub(crate) fn crosses(taker_side: Side, limit: Option<u128>, level_price: u128) -> bool {
    match (taker_side, limit) {
        (_, None) => true,
        (Side::Buy, Some(limit)) => level_price <= limit,
        (Side::Sell, Some(limit)) => level_price >= limit,
    }
}

/// Drain the opposing side book until the price no longer crosses or the
/// quantity is exhausted. Empty levels are removed inside the same pass.
pub(crate) fn execute(
    taker_side: Side,
    limit: Option<u128>,
    quantity: u64,
    opposite: &mut SideBook,
) -> MatchOutcome {
    let mut outcome = MatchOutcome {
        remaining: quantity,
        ..MatchOutcome::default()
    };

    while outcome.remaining > 0 {
        let Some(mut entry) = opposite.best_entry() else {
            break;
        };
        let price = *entry.key();
        if !crosses(taker_side, limit, price) {
            break;
        }

        let level = entry.get_mut();
        while outcome.remaining > 0 {
            let Some(FrontFill {
                maker_order_id,
                maker_user_id,
                quantity: filled,
                maker_remaining,
                maker_done,
            }) = level.fill_front(outcome.remaining)
            else {
                break;
            };
            trace!(
                maker = %maker_order_id,
                price,
                filled,
                maker_remaining,
                "fill"
            );
            outcome.remaining -= filled;
            outcome.fills.push(Fill {
                maker_order_id,
                maker_user_id,
                price,
                quantity: filled,
                maker_remaining,
                maker_done,
            });
        }

        let removed = level.order_count() == 0;
        outcome.levels.push(LevelTouch {
            price,
            removed,
            visible_quantity: level.visible_quantity(),
            order_count: level.order_count(),
        });
        if removed {
            entry.remove();
        }
    }

    outcome
}

/// Maximum quantity fillable at crossing prices without mutating anything.
/// This is the first phase of fill-or-kill handling. Hidden iceberg
/// quantity counts: it is fillable, merely not displayed.
pub(crate) fn probe(
    taker_side: Side,
    limit: Option<u128>,
    quantity: u64,
    opposite: &SideBook,
) -> u64 {
    let mut available = 0u64;
    for level in opposite.iter_from_best() {
        if available >= quantity {
            break;
        }
        if !crosses(taker_side, limit, level.price()) {
            break;
        }
        available = available.saturating_add(level.total_quantity());
    }
    available.min(quantity)
}
