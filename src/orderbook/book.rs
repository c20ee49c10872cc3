//! Core OrderBook: configuration, serialized state and read operations.
//!
//! One `Mutex` guards everything mutable: both side books, the order index,
//! the stop table, the expiry queue, the trade log and the statistics.
//! `submit`, `cancel`, `modify`, `sweep_expired` and `snapshot` each take
//! the lock exactly once, so every caller observes an atomic, consistent
//! book. Event handlers run on the mutating thread while the lock is held
//! and must not re-enter the book API.
//!
//! Best bid/ask and the last trade price are mirrored into lock-free cells
//! after every mutation, so quote reads never contend with matching.

use super::error::OrderBookError;
use super::expiry::ExpiryQueue;
use super::level::{DepthView, LevelDepth};
use super::side_book::SideBook;
use super::snapshot::{BookSnapshot, DepthRow, SnapshotPackage};
use super::statistics::{BookStatistics, BookStats};
use super::stops::StopTable;
use super::trade::{Trade, TradeLog};
use crate::events::{EventBus, MarketEvent};
use crate::fees::FeeSchedule;
use crate::types::{Order, OrderId, Scale, Side};
use crate::utils::{current_time_millis, millis_to_secs_f64};
use crossbeam::atomic::AtomicCell;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Which price arms the stop table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReference {
    /// The most recent trade price. The default.
    #[default]
    LastTrade,
    /// Best ask for buy stops, best bid for sell stops.
    BestOppositeQuote,
}

/// Static configuration of one book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookConfig {
    /// Instrument symbol, e.g. `"BTC/USD"`.
    pub symbol: String,
    /// Decimal places carried by prices.
    pub price_precision: u32,
    /// Decimal places carried by quantities.
    pub quantity_precision: u32,
    /// Maker/taker fee rates.
    pub fees: FeeSchedule,
    /// Retained toggle. Fills always execute at the maker's price, which
    /// already yields price improvement; the flag exists for order types
    /// that may want to opt out later.
    pub enable_price_improvement: bool,
    /// Sweep interval used by [`ExpirySweeper`].
    ///
    /// [`ExpirySweeper`]: super::expiry::ExpirySweeper
    pub check_expiry_interval: Duration,
    /// Capacity of the trade ring.
    pub max_trade_history: usize,
    /// Capacity of the event history ring.
    pub max_event_history: usize,
    /// Price feeding the stop table.
    pub stop_reference: StopReference,
    /// Session close for Day orders, epoch milliseconds. Day orders rest
    /// like GTC when unset.
    pub session_close: Option<u64>,
    /// Top-N window whose change triggers `DEPTH_CHANGED`.
    pub depth_watch: usize,
}

impl BookConfig {
    /// Defaults: 2/8 precision, zero fees, 1 s sweep, 10 000 trades,
    /// 1 000 events, last-trade stop reference, top-10 depth watch.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            price_precision: 2,
            quantity_precision: 8,
            fees: FeeSchedule::zero(),
            enable_price_improvement: true,
            check_expiry_interval: Duration::from_secs(1),
            max_trade_history: 10_000,
            max_event_history: 1_000,
            stop_reference: StopReference::LastTrade,
            session_close: None,
            depth_watch: 10,
        }
    }

    /// Override the decimal precisions.
    pub fn with_precisions(mut self, price_precision: u32, quantity_precision: u32) -> Self {
        self.price_precision = price_precision;
        self.quantity_precision = quantity_precision;
        self
    }

    /// Override the fee schedule.
    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    /// Override the stop reference price source.
    pub fn with_stop_reference(mut self, stop_reference: StopReference) -> Self {
        self.stop_reference = stop_reference;
        self
    }

    /// Set the session close used by Day orders.
    pub fn with_session_close(mut self, session_close: u64) -> Self {
        self.session_close = Some(session_close);
        self
    }

    /// Override the expiry sweep interval.
    pub fn with_expiry_interval(mut self, interval: Duration) -> Self {
        self.check_expiry_interval = interval;
        self
    }

    /// Override the trade ring capacity.
    pub fn with_trade_history(mut self, max_trade_history: usize) -> Self {
        self.max_trade_history = max_trade_history;
        self
    }

    /// Override the event history capacity.
    pub fn with_event_history(mut self, max_event_history: usize) -> Self {
        self.max_event_history = max_event_history;
        self
    }

    /// Override the depth-change watch window.
    pub fn with_depth_watch(mut self, depth_watch: usize) -> Self {
        self.depth_watch = depth_watch;
        self
    }

    pub(crate) fn scale(&self) -> Scale {
        Scale::new(self.price_precision, self.quantity_precision)
    }
}

/// Everything the book mutates, guarded by one mutex.
pub(crate) struct BookCore {
    pub(crate) bids: SideBook,
    pub(crate) asks: SideBook,
    /// Order id to (side, level price) for O(1) lookup on cancel/modify.
    pub(crate) order_index: HashMap<OrderId, (Side, u128)>,
    pub(crate) stops: StopTable,
    pub(crate) expiry: ExpiryQueue,
    pub(crate) trades: TradeLog,
    pub(crate) stats: BookStatistics,
    next_sequence: u64,
    pub(crate) last_trade: Option<u128>,
    pub(crate) watched_bids: Vec<LevelDepth>,
    pub(crate) watched_asks: Vec<LevelDepth>,
}

impl BookCore {
    fn new(config: &BookConfig) -> Self {
        Self {
            bids: SideBook::new(Side::Buy),
            asks: SideBook::new(Side::Sell),
            order_index: HashMap::new(),
            stops: StopTable::new(),
            expiry: ExpiryQueue::new(),
            trades: TradeLog::new(config.max_trade_history),
            stats: BookStatistics::new(),
            next_sequence: 1,
            last_trade: None,
            watched_bids: Vec::new(),
            watched_asks: Vec::new(),
        }
    }

    pub(crate) fn side(&self, side: Side) -> &SideBook {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub(crate) fn side_mut(&mut self, side: Side) -> &mut SideBook {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    pub(crate) fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

/// A price-time priority order book for one instrument.
pub struct OrderBook {
    config: BookConfig,
    scale: Scale,
    inner: Mutex<BookCore>,
    pub(super) events: Arc<EventBus>,
    poisoned: AtomicBool,
    // Lock-free quote mirror, refreshed inside the critical section.
    best_bid: AtomicCell<u128>,
    has_best_bid: AtomicBool,
    best_ask: AtomicCell<u128>,
    has_best_ask: AtomicBool,
    last_trade_price: AtomicCell<u128>,
    has_traded: AtomicBool,
}

impl OrderBook {
    /// Create a book with default configuration for the given symbol.
    pub fn new(symbol: &str) -> Self {
        Self::with_config(BookConfig::new(symbol))
    }

    /// Create a book from an explicit configuration.
    pub fn with_config(config: BookConfig) -> Self {
        let scale = config.scale();
        let inner = Mutex::new(BookCore::new(&config));
        let events = Arc::new(EventBus::new(config.max_event_history));
        Self {
            config,
            scale,
            inner,
            events,
            poisoned: AtomicBool::new(false),
            best_bid: AtomicCell::new(0),
            has_best_bid: AtomicBool::new(false),
            best_ask: AtomicCell::new(0),
            has_best_ask: AtomicBool::new(false),
            last_trade_price: AtomicCell::new(0),
            has_traded: AtomicBool::new(false),
        }
    }

    /// The instrument symbol.
    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    /// The book's configuration.
    pub fn config(&self) -> &BookConfig {
        &self.config
    }

    /// The book's decimal scale.
    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// Handle for subscribing to this book's events.
    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Acquire the critical section, refusing when the book is poisoned.
    pub(crate) fn core(&self) -> Result<MutexGuard<'_, BookCore>, OrderBookError> {
        if self.poisoned.load(Ordering::Relaxed) {
            return Err(OrderBookError::Poisoned);
        }
        self.inner.lock().map_err(|_| {
            self.poisoned.store(true, Ordering::Relaxed);
            OrderBookError::Poisoned
        })
    }

    /// Mark the book unusable after an internal invariant violation.
    pub(crate) fn poison(&self, context: &str) -> OrderBookError {
        tracing::error!(symbol = %self.config.symbol, context, "internal invariant violated; poisoning book");
        self.poisoned.store(true, Ordering::Relaxed);
        OrderBookError::Poisoned
    }

    /// Best bid in ticks, from the lock-free mirror.
    pub fn best_bid_ticks(&self) -> Option<u128> {
        self.has_best_bid
            .load(Ordering::Acquire)
            .then(|| self.best_bid.load())
    }

    /// Best ask in ticks, from the lock-free mirror.
    pub fn best_ask_ticks(&self) -> Option<u128> {
        self.has_best_ask
            .load(Ordering::Acquire)
            .then(|| self.best_ask.load())
    }

    /// Best bid in display units.
    pub fn best_bid(&self) -> Option<f64> {
        self.best_bid_ticks().map(|t| self.scale.ticks_to_price(t))
    }

    /// Best ask in display units.
    pub fn best_ask(&self) -> Option<f64> {
        self.best_ask_ticks().map(|t| self.scale.ticks_to_price(t))
    }

    /// Best ask minus best bid, in display units.
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Midpoint of the best quotes, in display units.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    /// Price of the most recent trade, in display units.
    pub fn last_trade_price(&self) -> Option<f64> {
        self.has_traded
            .load(Ordering::Acquire)
            .then(|| self.scale.ticks_to_price(self.last_trade_price.load()))
    }

    pub(crate) fn refresh_quote_cache(&self, core: &BookCore) {
        match core.bids.best_price() {
            Some(price) => {
                self.best_bid.store(price);
                self.has_best_bid.store(true, Ordering::Release);
            }
            None => self.has_best_bid.store(false, Ordering::Release),
        }
        match core.asks.best_price() {
            Some(price) => {
                self.best_ask.store(price);
                self.has_best_ask.store(true, Ordering::Release);
            }
            None => self.has_best_ask.store(false, Ordering::Release),
        }
        if let Some(price) = core.last_trade {
            self.last_trade_price.store(price);
            self.has_traded.store(true, Ordering::Release);
        }
    }

    /// Consistent point-in-time view of both sides, displayed depth,
    /// truncated to `depth` levels (all when `None`).
    pub fn snapshot(&self, depth: Option<usize>) -> Result<BookSnapshot, OrderBookError> {
        let core = self.core()?;
        Ok(self.snapshot_locked(&core, depth))
    }

    pub(crate) fn snapshot_locked(&self, core: &BookCore, depth: Option<usize>) -> BookSnapshot {
        let to_row = |level: LevelDepth| DepthRow {
            price: self.scale.ticks_to_price(level.price),
            quantity: self.scale.lots_to_quantity(level.quantity),
            order_count: level.order_count,
        };
        BookSnapshot {
            symbol: self.config.symbol.clone(),
            timestamp: millis_to_secs_f64(current_time_millis()),
            bids: core
                .bids
                .depth(depth, DepthView::Displayed)
                .into_iter()
                .map(to_row)
                .collect(),
            asks: core
                .asks
                .depth(depth, DepthView::Displayed)
                .into_iter()
                .map(to_row)
                .collect(),
        }
    }

    /// Checksummed snapshot package for integrity-checked hand-off.
    /// Publishes `SNAPSHOT_CREATED`.
    pub fn snapshot_package(&self, depth: Option<usize>) -> Result<SnapshotPackage, OrderBookError> {
        let snapshot = self.snapshot(depth)?;
        let package = SnapshotPackage::new(snapshot)?;
        self.events.publish(MarketEvent::SnapshotCreated {
            symbol: self.config.symbol.clone(),
            timestamp: current_time_millis(),
            checksum: package.checksum.clone(),
        });
        Ok(package)
    }

    /// Most recent trades, newest first.
    pub fn trades(&self, limit: usize) -> Result<Vec<Trade>, OrderBookError> {
        Ok(self.core()?.trades.recent(limit))
    }

    /// Consistent statistics snapshot.
    pub fn statistics(&self) -> Result<BookStats, OrderBookError> {
        let core = self.core()?;
        let best_bid = core.bids.best_price().map(|t| self.scale.ticks_to_price(t));
        let best_ask = core.asks.best_price().map(|t| self.scale.ticks_to_price(t));
        let spread = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        };
        let mid_price = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        };
        Ok(BookStats {
            symbol: self.config.symbol.clone(),
            order_counts: core.stats.orders,
            trade_count: core.stats.trade_count,
            volume: core.stats.volume_lots as f64
                / 10f64.powi(self.config.quantity_precision as i32),
            resting_orders: core.bids.order_count() + core.asks.order_count(),
            parked_stops: core.stops.len(),
            best_bid,
            best_ask,
            spread,
            mid_price,
            last_trade_price: core.last_trade.map(|t| self.scale.ticks_to_price(t)),
            latencies: core.stats.latency_summary(),
        })
    }

    /// Clone of a live order: resting or parked in the stop table.
    pub fn order(&self, order_id: &OrderId) -> Result<Option<Order>, OrderBookError> {
        let core = self.core()?;
        if let Some(&(side, price)) = core.order_index.get(order_id) {
            return Ok(core
                .side(side)
                .level(price)
                .and_then(|level| level.get(order_id))
                .cloned());
        }
        Ok(core.stops.find(order_id).cloned())
    }

    /// Whether an order id is currently live in this book.
    pub fn contains(&self, order_id: &OrderId) -> Result<bool, OrderBookError> {
        let core = self.core()?;
        Ok(core.order_index.contains_key(order_id) || core.stops.find(order_id).is_some())
    }

    /// Number of resting orders across both sides.
    pub fn resting_orders(&self) -> Result<usize, OrderBookError> {
        let core = self.core()?;
        Ok(core.bids.order_count() + core.asks.order_count())
    }

    /// True when neither side has a level and no stop is parked.
    pub fn is_empty(&self) -> Result<bool, OrderBookError> {
        let core = self.core()?;
        Ok(core.bids.is_empty() && core.asks.is_empty() && core.stops.is_empty())
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("symbol", &self.config.symbol)
            .field("best_bid", &self.best_bid_ticks())
            .field("best_ask", &self.best_ask_ticks())
            .field("poisoned", &self.poisoned.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
