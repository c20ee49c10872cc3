//! A single price level: FIFO queue of resting orders plus cached
//! aggregates.
//!
//! The head of the queue is the oldest order and therefore the first to
//! fill. Aggregates are maintained incrementally on every mutation so depth
//! queries never walk the queue.

use crate::types::{Order, OrderId, Side, UserId};
use serde::Serialize;
use std::collections::VecDeque;

/// Which quantity a depth query aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthView {
    /// Sum of true remaining quantities, icebergs included in full.
    Full,
    /// Sum of displayed quantities; the snapshot default.
    #[default]
    Displayed,
}

/// One `{price, quantity, order_count}` row of a depth query, in ticks and
/// lots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelDepth {
    /// Level price in ticks.
    pub price: u128,
    /// Aggregate quantity in lots, per the requested [`DepthView`].
    pub quantity: u64,
    /// Number of live orders queued at this price.
    pub order_count: usize,
}

/// Result of filling the order at the head of a level.
#[derive(Debug, Clone)]
pub(crate) struct FrontFill {
    /// The maker that was hit.
    pub maker_order_id: OrderId,
    /// Its owner.
    pub maker_user_id: UserId,
    /// Quantity actually filled, in lots.
    pub quantity: u64,
    /// Maker quantity left after the fill.
    pub maker_remaining: u64,
    /// The maker filled completely and left the queue.
    pub maker_done: bool,
}

/// Ordered queue of live orders at one price on one side.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    price: u128,
    side: Side,
    orders: VecDeque<Order>,
    total_quantity: u64,
    visible_quantity: u64,
}

impl PriceLevel {
    pub(crate) fn new(price: u128, side: Side) -> Self {
        Self {
            price,
            side,
            orders: VecDeque::new(),
            total_quantity: 0,
            visible_quantity: 0,
        }
    }

    /// The level's price in ticks.
    pub fn price(&self) -> u128 {
        self.price
    }

    /// The side this level belongs to.
    pub fn side(&self) -> Side {
        self.side
    }

    /// Number of live orders queued here.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Sum of true remaining quantities.
    pub fn total_quantity(&self) -> u64 {
        self.total_quantity
    }

    /// Sum of displayed quantities.
    pub fn visible_quantity(&self) -> u64 {
        self.visible_quantity
    }

    /// Aggregate quantity for the requested view.
    pub fn quantity(&self, view: DepthView) -> u64 {
        match view {
            DepthView::Full => self.total_quantity,
            DepthView::Displayed => self.visible_quantity,
        }
    }

    /// Iterate the queue head (oldest) first.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    /// The oldest order, next in line to fill.
    pub(crate) fn front(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Append at the tail of the time-priority queue.
    pub(crate) fn push_back(&mut self, order: Order) {
        self.total_quantity = self.total_quantity.saturating_add(order.quantity);
        self.visible_quantity = self.visible_quantity.saturating_add(order.displayed_quantity);
        self.orders.push_back(order);
    }

    /// Fill up to `quantity` lots against the head order, popping it when it
    /// completes. Iceberg heads refresh their displayed slice in place and
    /// keep their queue position.
    pub(crate) fn fill_front(&mut self, quantity: u64) -> Option<FrontFill> {
        let order = self.orders.front_mut()?;
        let fill = quantity.min(order.quantity);
        if fill == 0 {
            return None;
        }
        let displayed_before = order.displayed_quantity;
        order.fill(fill);
        self.total_quantity = self.total_quantity.saturating_sub(fill);
        self.visible_quantity = self
            .visible_quantity
            .saturating_sub(displayed_before.saturating_sub(order.displayed_quantity));

        let result = FrontFill {
            maker_order_id: order.id.clone(),
            maker_user_id: order.user_id.clone(),
            quantity: fill,
            maker_remaining: order.quantity,
            maker_done: order.is_filled(),
        };
        if result.maker_done {
            self.orders.pop_front();
        }
        Some(result)
    }

    /// Remove an order by id, anywhere in the queue.
    pub(crate) fn remove(&mut self, id: &OrderId) -> Option<Order> {
        let position = self.orders.iter().position(|o| &o.id == id)?;
        let order = self.orders.remove(position)?;
        self.total_quantity = self.total_quantity.saturating_sub(order.quantity);
        self.visible_quantity = self
            .visible_quantity
            .saturating_sub(order.displayed_quantity);
        Some(order)
    }

    /// Find an order by id.
    pub(crate) fn get(&self, id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| &o.id == id)
    }

    /// Reduce an order's quantity in place, preserving its queue position.
    /// Returns the updated order clone, or `None` when absent.
    pub(crate) fn reduce_quantity(&mut self, id: &OrderId, new_quantity: u64) -> Option<Order> {
        let order = self.orders.iter_mut().find(|o| &o.id == id)?;
        let delta = order.quantity.saturating_sub(new_quantity);
        let displayed_before = order.displayed_quantity;
        order.quantity = new_quantity;
        order.refresh_display();
        self.total_quantity = self.total_quantity.saturating_sub(delta);
        self.visible_quantity = self
            .visible_quantity
            .saturating_sub(displayed_before.saturating_sub(order.displayed_quantity));
        Some(order.clone())
    }

    /// Update an order's expiry in place.
    pub(crate) fn set_expiry(&mut self, id: &OrderId, expiry_time: Option<u64>) -> Option<Order> {
        let order = self.orders.iter_mut().find(|o| &o.id == id)?;
        order.expiry_time = expiry_time;
        Some(order.clone())
    }

    /// Depth row for this level.
    pub fn depth(&self, view: DepthView) -> LevelDepth {
        LevelDepth {
            price: self.price,
            quantity: self.quantity(view),
            order_count: self.orders.len(),
        }
    }
}
