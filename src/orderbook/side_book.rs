//! One side of the book: a price-ordered map of levels.
//!
//! Bids iterate descending and asks ascending, so `iter_from_best` always
//! yields levels in matching order. The map lives inside the owning book's
//! mutex; nothing here is concurrent.

use super::level::{DepthView, LevelDepth, PriceLevel};
use crate::types::{Order, OrderId, Side};
use either::Either;
use std::collections::BTreeMap;
use std::collections::btree_map::OccupiedEntry;

/// Sorted collection of [`PriceLevel`]s for one side.
#[derive(Debug, Clone)]
pub struct SideBook {
    side: Side,
    levels: BTreeMap<u128, PriceLevel>,
}

impl SideBook {
    pub(crate) fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    /// The side this book holds.
    pub fn side(&self) -> Side {
        self.side
    }

    /// True when no level is present.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of price levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Number of live orders across all levels.
    pub fn order_count(&self) -> usize {
        self.levels.values().map(PriceLevel::order_count).sum()
    }

    /// Aggregate quantity across all levels for the requested view.
    pub fn total_quantity(&self, view: DepthView) -> u64 {
        self.levels
            .values()
            .fold(0u64, |acc, level| acc.saturating_add(level.quantity(view)))
    }

    /// Best price: highest bid or lowest ask.
    pub fn best_price(&self) -> Option<u128> {
        match self.side {
            Side::Buy => self.levels.last_key_value().map(|(p, _)| *p),
            Side::Sell => self.levels.first_key_value().map(|(p, _)| *p),
        }
    }

    /// The best-priced level.
    pub fn best(&self) -> Option<&PriceLevel> {
        match self.side {
            Side::Buy => self.levels.last_key_value().map(|(_, l)| l),
            Side::Sell => self.levels.first_key_value().map(|(_, l)| l),
        }
    }

    /// Entry for the best-priced level, allowing in-place drain and removal.
    pub(crate) fn best_entry(&mut self) -> Option<OccupiedEntry<'_, u128, PriceLevel>> {
        match self.side {
            Side::Buy => self.levels.last_entry(),
            Side::Sell => self.levels.first_entry(),
        }
    }

    /// Look up a level by price.
    pub fn level(&self, price: u128) -> Option<&PriceLevel> {
        self.levels.get(&price)
    }

    pub(crate) fn level_mut(&mut self, price: u128) -> Option<&mut PriceLevel> {
        self.levels.get_mut(&price)
    }

    /// Append an order at the tail of its price level, creating the level
    /// when absent. Returns `true` when a new level was created.
    pub(crate) fn insert(&mut self, order: Order) -> bool {
        let price = order.price;
        let side = self.side;
        let mut created = false;
        let level = self.levels.entry(price).or_insert_with(|| {
            created = true;
            PriceLevel::new(price, side)
        });
        level.push_back(order);
        created
    }

    /// Remove an order from its level, dropping the level when it empties.
    /// Returns the order and whether the level was removed.
    pub(crate) fn remove(&mut self, price: u128, id: &OrderId) -> Option<(Order, bool)> {
        let level = self.levels.get_mut(&price)?;
        let order = level.remove(id)?;
        let emptied = level.order_count() == 0;
        if emptied {
            self.levels.remove(&price);
        }
        Some((order, emptied))
    }

    /// Levels in matching order: best first.
    pub fn iter_from_best(&self) -> impl Iterator<Item = &PriceLevel> {
        match self.side {
            Side::Buy => Either::Left(self.levels.values().rev()),
            Side::Sell => Either::Right(self.levels.values()),
        }
    }

    /// The top `limit` levels (all when `None`) as depth rows.
    pub fn depth(&self, limit: Option<usize>, view: DepthView) -> Vec<LevelDepth> {
        let take = limit.unwrap_or(usize::MAX);
        self.iter_from_best()
            .take(take)
            .map(|level| level.depth(view))
            .collect()
    }
}
