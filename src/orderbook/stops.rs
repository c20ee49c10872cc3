//! Parked stop orders.
//!
//! Stops wait in trigger-price order per side until the reference price
//! reaches them. Buy stops trigger when the reference rises to or above the
//! trigger; sell stops when it falls to or below. Triggered drains are
//! deterministic: ascending trigger for buys, descending for sells, arrival
//! sequence as the tie-break. Trailing stops re-ratchet their trigger on
//! every reference move before triggering is evaluated.

use crate::types::{Order, OrderId, OrderKind, Side};
use std::collections::BTreeMap;
use tracing::trace;

/// Basis points denominator for percent trails.
const BPS: u128 = 10_000;

#[derive(Debug, Default)]
pub(crate) struct StopTable {
    buy: BTreeMap<u128, Vec<Order>>,
    sell: BTreeMap<u128, Vec<Order>>,
}

impl StopTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.buy.values().map(Vec::len).sum::<usize>()
            + self.sell.values().map(Vec::len).sum::<usize>()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buy.is_empty() && self.sell.is_empty()
    }

    /// Park an order at its trigger price. Orders without a trigger are
    /// ignored; the submit path validates the trigger before parking.
    pub(crate) fn park(&mut self, order: Order) {
        let Some(trigger) = order.stop_price else {
            return;
        };
        trace!(order_id = %order.id, side = %order.side, trigger, "parking stop");
        self.side_map_mut(order.side)
            .entry(trigger)
            .or_default()
            .push(order);
    }

    /// Find a parked order by id.
    pub(crate) fn find(&self, id: &OrderId) -> Option<&Order> {
        self.buy
            .values()
            .chain(self.sell.values())
            .flatten()
            .find(|order| &order.id == id)
    }

    /// Remove a parked order by id.
    pub(crate) fn remove(&mut self, id: &OrderId) -> Option<Order> {
        for map in [&mut self.buy, &mut self.sell] {
            let mut found: Option<(u128, usize)> = None;
            for (key, orders) in map.iter() {
                if let Some(position) = orders.iter().position(|o| &o.id == id) {
                    found = Some((*key, position));
                    break;
                }
            }
            if let Some((key, position)) = found {
                let orders = map.get_mut(&key)?;
                let order = orders.remove(position);
                if orders.is_empty() {
                    map.remove(&key);
                }
                return Some(order);
            }
        }
        None
    }

    /// All parked orders, buys then sells, in trigger order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Order> {
        self.buy
            .values()
            .flatten()
            .chain(self.sell.values().flatten())
    }

    /// Ratchet trailing-stop triggers toward the reference price. Sell
    /// trails rise with the market, buy trails fall; neither ever loosens.
    pub(crate) fn ratchet_trailing(&mut self, reference: u128) {
        ratchet_side(&mut self.buy, reference);
        ratchet_side(&mut self.sell, reference);
    }

    /// Drain every stop whose trigger is reached, in deterministic order:
    /// buys ascending by trigger, then sells descending, each tie-broken by
    /// arrival sequence.
    pub(crate) fn take_triggered(
        &mut self,
        buy_reference: Option<u128>,
        sell_reference: Option<u128>,
    ) -> Vec<Order> {
        let mut triggered = Vec::new();

        if let Some(reference) = buy_reference {
            let keys: Vec<u128> = self.buy.range(..=reference).map(|(k, _)| *k).collect();
            for key in keys {
                if let Some(mut orders) = self.buy.remove(&key) {
                    orders.sort_by_key(|o| o.sequence);
                    triggered.append(&mut orders);
                }
            }
        }

        if let Some(reference) = sell_reference {
            let keys: Vec<u128> = self.sell.range(reference..).map(|(k, _)| *k).collect();
            for key in keys.into_iter().rev() {
                if let Some(mut orders) = self.sell.remove(&key) {
                    orders.sort_by_key(|o| o.sequence);
                    triggered.append(&mut orders);
                }
            }
        }

        triggered
    }

    fn side_map_mut(&mut self, side: Side) -> &mut BTreeMap<u128, Vec<Order>> {
        match side {
            Side::Buy => &mut self.buy,
            Side::Sell => &mut self.sell,
        }
    }
}

fn ratchet_side(map: &mut BTreeMap<u128, Vec<Order>>, reference: u128) {
    let mut moved: Vec<Order> = Vec::new();
    let mut emptied: Vec<u128> = Vec::new();

    for (key, orders) in map.iter_mut() {
        let mut i = 0;
        while i < orders.len() {
            match ratcheted_trigger(&orders[i], reference) {
                Some(new_trigger) if new_trigger != *key => {
                    let mut order = orders.remove(i);
                    trace!(order_id = %order.id, from = *key, to = new_trigger, "trail ratchet");
                    order.stop_price = Some(new_trigger);
                    moved.push(order);
                }
                _ => i += 1,
            }
        }
        if orders.is_empty() {
            emptied.push(*key);
        }
    }

    for key in emptied {
        map.remove(&key);
    }
    for order in moved {
        if let Some(trigger) = order.stop_price {
            map.entry(trigger).or_default().push(order);
        }
    }
}

/// The tightened trigger for a trailing stop at the given reference, or
/// `None` when the order is not trailing or the trigger would loosen.
fn ratcheted_trigger(order: &Order, reference: u128) -> Option<u128> {
    if order.kind != OrderKind::TrailingStop {
        return None;
    }
    let current = order.stop_price?;
    let trail = trail_ticks(order, reference)?;
    match order.side {
        // A sell trail protects against a fall: trigger tracks upward.
        Side::Sell => {
            let desired = reference.saturating_sub(trail);
            (desired > current).then_some(desired)
        }
        // A buy trail chases a falling market: trigger tracks downward.
        Side::Buy => {
            let desired = reference.saturating_add(trail);
            (desired < current).then_some(desired)
        }
    }
}

/// Initial trigger for a trailing stop submitted without an explicit one:
/// the reference price minus the trail for sells, plus it for buys.
pub(crate) fn derive_trigger(
    side: Side,
    trail_value: u64,
    trail_is_percent: bool,
    reference: u128,
) -> u128 {
    let trail = if trail_is_percent {
        reference.saturating_mul(trail_value as u128) / BPS
    } else {
        trail_value as u128
    };
    match side {
        Side::Sell => reference.saturating_sub(trail),
        Side::Buy => reference.saturating_add(trail),
    }
}

fn trail_ticks(order: &Order, reference: u128) -> Option<u128> {
    let trail = order.trail_value? as u128;
    if order.trail_is_percent {
        Some(reference.saturating_mul(trail) / BPS)
    } else {
        Some(trail)
    }
}
