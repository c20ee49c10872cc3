//! Multi-instrument composition.
//!
//! The registry maps symbols to books and routes order-id based calls to
//! the owning book through a global id-to-symbol index. Cross-book maps are
//! concurrent (`DashMap`); the registry itself never holds two book locks
//! at once, so instruments stay independent.
//!
//! The per-user index and the id-to-symbol map are maintained by a handler
//! subscribed to every child book's bus, pruning on terminal events.
//! Parked stops never publish `ORDER_ADDED`, so `place` also registers
//! surviving orders directly.

use crate::events::MarketEvent;
use crate::orderbook::{BookConfig, BookSnapshot, BookStats, OrderBook, OrderBookError, SubmitResult};
use crate::types::{Order, OrderId, OrderPatch, OrderSpec, UserId};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Aggregated statistics across every registered book.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    /// Number of registered books.
    pub books: usize,
    /// Resting orders across all books.
    pub resting_orders: usize,
    /// Parked stops across all books.
    pub parked_stops: usize,
    /// Trades executed across all books.
    pub trade_count: u64,
    /// Orders currently tracked in the id-to-symbol index.
    pub tracked_orders: usize,
    /// Per-book statistics snapshots.
    pub per_book: Vec<BookStats>,
}

/// Symbol-to-book registry with global order routing.
pub struct MarketRegistry {
    books: DashMap<String, Arc<OrderBook>>,
    order_symbols: Arc<DashMap<OrderId, String>>,
    user_orders: Arc<DashMap<UserId, HashSet<OrderId>>>,
}

impl MarketRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            order_symbols: Arc::new(DashMap::new()),
            user_orders: Arc::new(DashMap::new()),
        }
    }

    /// Create and register a book. Fails when the symbol is taken.
    pub fn create(&self, config: BookConfig) -> Result<Arc<OrderBook>, OrderBookError> {
        let symbol = config.symbol.clone();
        if self.books.contains_key(&symbol) {
            return Err(OrderBookError::SymbolExists(symbol));
        }

        let book = Arc::new(OrderBook::with_config(config));
        self.attach_index_handler(&book);
        self.books.insert(symbol.clone(), Arc::clone(&book));
        info!(symbol, "order book registered");
        Ok(book)
    }

    /// Look up a book by symbol.
    pub fn get(&self, symbol: &str) -> Option<Arc<OrderBook>> {
        self.books.get(symbol).map(|entry| Arc::clone(entry.value()))
    }

    /// All registered symbols.
    pub fn list(&self) -> Vec<String> {
        self.books.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Number of registered books.
    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    /// Deregister a book, dropping its index entries.
    pub fn remove(&self, symbol: &str) -> Option<Arc<OrderBook>> {
        let (_, book) = self.books.remove(symbol)?;

        let removed_ids: Vec<OrderId> = self
            .order_symbols
            .iter()
            .filter(|entry| entry.value() == symbol)
            .map(|entry| entry.key().clone())
            .collect();
        for id in &removed_ids {
            self.order_symbols.remove(id);
        }
        self.user_orders.retain(|_, ids| {
            for id in &removed_ids {
                ids.remove(id);
            }
            !ids.is_empty()
        });

        info!(symbol, "order book removed");
        Some(book)
    }

    /// Submit an order to the book owning `symbol`.
    pub fn place(&self, symbol: &str, spec: OrderSpec) -> Result<SubmitResult, OrderBookError> {
        let book = self
            .get(symbol)
            .ok_or_else(|| OrderBookError::UnknownSymbol(symbol.to_string()))?;
        let result = book.submit(spec)?;

        // Re-check liveness: a resting residual can be consumed by a stop
        // triggered inside the same submit call.
        if result.is_live() && book.contains(&result.order_id).unwrap_or(false) {
            self.order_symbols
                .insert(result.order_id.clone(), symbol.to_string());
            // Resting orders were indexed by the ORDER_ADDED handler;
            // parked stops publish nothing, so index their owner here.
            if result.parked
                && let Ok(Some(order)) = book.order(&result.order_id)
                && !order.user_id.is_anonymous()
            {
                self.user_orders
                    .entry(order.user_id)
                    .or_default()
                    .insert(result.order_id.clone());
            }
        }
        Ok(result)
    }

    /// Cancel an order wherever it lives.
    pub fn cancel(&self, order_id: &OrderId) -> Result<(), OrderBookError> {
        let symbol = self
            .order_symbols
            .get(order_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OrderBookError::NotFound(order_id.clone()))?;
        let book = self
            .get(&symbol)
            .ok_or_else(|| OrderBookError::NotFound(order_id.clone()))?;
        book.cancel(order_id)
    }

    /// Modify an order wherever it lives.
    pub fn modify(&self, order_id: &OrderId, patch: OrderPatch) -> Result<(), OrderBookError> {
        let symbol = self
            .order_symbols
            .get(order_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OrderBookError::NotFound(order_id.clone()))?;
        let book = self
            .get(&symbol)
            .ok_or_else(|| OrderBookError::NotFound(order_id.clone()))?;
        book.modify(order_id, patch)
    }

    /// Every live order owned by a user, across all books.
    pub fn user_orders(&self, user_id: &UserId) -> Vec<Order> {
        let ids: Vec<OrderId> = self
            .user_orders
            .get(user_id)
            .map(|entry| entry.value().iter().cloned().collect())
            .unwrap_or_default();

        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(symbol) = self
                .order_symbols
                .get(&id)
                .map(|entry| entry.value().clone())
            else {
                continue;
            };
            let Some(book) = self.get(&symbol) else {
                continue;
            };
            if let Ok(Some(order)) = book.order(&id) {
                orders.push(order);
            }
        }
        orders
    }

    /// Snapshot one book.
    pub fn snapshot(
        &self,
        symbol: &str,
        depth: Option<usize>,
    ) -> Result<BookSnapshot, OrderBookError> {
        let book = self
            .get(symbol)
            .ok_or_else(|| OrderBookError::UnknownSymbol(symbol.to_string()))?;
        book.snapshot(depth)
    }

    /// Sweep expired orders across every book, one lock at a time.
    /// Poisoned books are skipped.
    pub fn sweep_expired(&self) -> usize {
        let books: Vec<Arc<OrderBook>> = self
            .books
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let now = crate::utils::current_time_millis();
        let mut total = 0;
        for book in books {
            match book.sweep_expired(now) {
                Ok(count) => total += count,
                Err(error) => {
                    warn!(symbol = book.symbol(), %error, "sweep skipped");
                }
            }
        }
        total
    }

    /// Aggregated statistics. Poisoned books are skipped.
    pub fn stats(&self) -> RegistryStats {
        let books: Vec<Arc<OrderBook>> = self
            .books
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut per_book = Vec::with_capacity(books.len());
        for book in &books {
            match book.statistics() {
                Ok(stats) => per_book.push(stats),
                Err(error) => warn!(symbol = book.symbol(), %error, "statistics skipped"),
            }
        }

        RegistryStats {
            books: books.len(),
            resting_orders: per_book.iter().map(|s| s.resting_orders).sum(),
            parked_stops: per_book.iter().map(|s| s.parked_stops).sum(),
            trade_count: per_book.iter().map(|s| s.trade_count).sum(),
            tracked_orders: self.order_symbols.len(),
            per_book,
        }
    }

    /// Wire the index-maintenance handler into a child book's bus. The
    /// handler runs under the book's lock, so it only touches the
    /// registry's concurrent maps.
    fn attach_index_handler(&self, book: &Arc<OrderBook>) {
        let order_symbols = Arc::clone(&self.order_symbols);
        let user_orders = Arc::clone(&self.user_orders);
        let symbol = book.symbol().to_string();

        book.event_bus().subscribe_all(Arc::new(move |event| {
            match event {
                MarketEvent::OrderAdded { order, .. } => {
                    order_symbols.insert(order.id.clone(), symbol.clone());
                    if !order.user_id.is_anonymous() {
                        user_orders
                            .entry(order.user_id.clone())
                            .or_default()
                            .insert(order.id.clone());
                    }
                }
                MarketEvent::OrderCancelled {
                    order_id, user_id, ..
                }
                | MarketEvent::OrderExpired {
                    order_id, user_id, ..
                } => {
                    order_symbols.remove(order_id);
                    untrack(&user_orders, user_id, order_id);
                }
                MarketEvent::OrderFilled {
                    order_id,
                    user_id,
                    remaining_quantity: 0,
                    ..
                } => {
                    order_symbols.remove(order_id);
                    untrack(&user_orders, user_id, order_id);
                }
                _ => {}
            }
        }));
    }
}

fn untrack(
    user_orders: &DashMap<UserId, HashSet<OrderId>>,
    user_id: &UserId,
    order_id: &OrderId,
) {
    if let Some(mut entry) = user_orders.get_mut(user_id) {
        entry.value_mut().remove(order_id);
        let empty = entry.value().is_empty();
        drop(entry);
        if empty {
            user_orders.remove_if(user_id, |_, ids| ids.is_empty());
        }
    }
}

impl Default for MarketRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MarketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketRegistry")
            .field("books", &self.books.len())
            .field("tracked_orders", &self.order_symbols.len())
            .finish_non_exhaustive()
    }
}
