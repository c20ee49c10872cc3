//! Trade records and the bounded in-memory trade log.

use crate::fees::FeeSchedule;
use crate::types::{OrderId, Side, UserId};
use serde::Serialize;
use std::collections::VecDeque;
use uuid::Uuid;

/// One maker/taker fill with fee attribution.
///
/// The price is always the maker's resting price, in ticks; the notional
/// used for fee math is `price * quantity`. Negative fees are rebates.
#[derive(Debug, Clone, Serialize)]
pub struct Trade {
    /// Unique trade identifier.
    pub trade_id: String,
    /// The resting order.
    pub maker_order_id: OrderId,
    /// The incoming order that crossed it.
    pub taker_order_id: OrderId,
    /// Execution price in ticks (the maker's price).
    pub price: u128,
    /// Executed quantity in lots.
    pub quantity: u64,
    /// Execution time, epoch milliseconds.
    pub timestamp: u64,
    /// Fee charged to the maker, in notional units.
    pub maker_fee: i128,
    /// Fee charged to the taker, in notional units.
    pub taker_fee: i128,
    /// Maker rate applied, basis points.
    pub maker_fee_bps: i32,
    /// Taker rate applied, basis points.
    pub taker_fee_bps: i32,
    /// Owner of the maker order.
    pub maker_user_id: UserId,
    /// Owner of the taker order.
    pub taker_user_id: UserId,
    /// Side of the aggressor.
    pub taker_side: Side,
}

impl Trade {
    /// Build a trade from a fill, computing fees from the schedule.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        maker_user_id: UserId,
        taker_user_id: UserId,
        taker_side: Side,
        price: u128,
        quantity: u64,
        timestamp: u64,
        fees: &FeeSchedule,
    ) -> Self {
        let notional = price.saturating_mul(quantity as u128);
        Self {
            trade_id: Uuid::new_v4().to_string(),
            maker_order_id,
            taker_order_id,
            price,
            quantity,
            timestamp,
            maker_fee: fees.maker_fee(notional),
            taker_fee: fees.taker_fee(notional),
            maker_fee_bps: fees.maker_fee_bps,
            taker_fee_bps: fees.taker_fee_bps,
            maker_user_id,
            taker_user_id,
            taker_side,
        }
    }

    /// Price times quantity, in scaled units.
    pub fn notional(&self) -> u128 {
        self.price.saturating_mul(self.quantity as u128)
    }
}

/// Bounded ring of recent trades. Oldest entries are overwritten silently
/// once the capacity is exceeded.
#[derive(Debug)]
pub(crate) struct TradeLog {
    ring: VecDeque<Trade>,
    capacity: usize,
}

impl TradeLog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            ring: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn push(&mut self, trade: Trade) {
        if self.ring.len() == self.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(trade);
    }

    /// Most recent trades first, up to `limit`.
    pub(crate) fn recent(&self, limit: usize) -> Vec<Trade> {
        self.ring.iter().rev().take(limit).cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.ring.len()
    }
}
