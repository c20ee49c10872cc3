//! Event vocabulary.
//!
//! Every book mutation is described by exactly one [`MarketEvent`]. Events
//! carry their symbol and emission time plus the payload fields consumers
//! need to mirror the book without re-querying it. For one order id the
//! emission sequence is causal: added, then modifications, then fills, then
//! a single terminal cancel/expiry/final fill.

use crate::orderbook::level::LevelDepth;
use crate::orderbook::trade::Trade;
use crate::types::{Order, OrderId, Side, UserId};
use bitflags::bitflags;
use serde::Serialize;
use std::fmt;

/// Why an order was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelReason {
    /// Explicit `cancel` call.
    UserRequested,
    /// Unfilled remainder of an immediate-or-cancel order.
    IocRemainder,
    /// The order's deadline passed.
    Expired,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CancelReason::UserRequested => "USER_REQUESTED",
            CancelReason::IocRemainder => "IOC_REMAINDER",
            CancelReason::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// Discriminant of a [`MarketEvent`], used for subscriptions and filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// An order rested in the book.
    OrderAdded,
    /// An order was modified in place or re-queued.
    OrderModified,
    /// An order left the book before completing.
    OrderCancelled,
    /// An order received a fill.
    OrderFilled,
    /// An order hit its deadline.
    OrderExpired,
    /// A submission was rejected without changing state.
    OrderRejected,
    /// A maker/taker fill executed.
    TradeExecuted,
    /// A new price level appeared.
    PriceLevelAdded,
    /// A price level emptied and was removed.
    PriceLevelRemoved,
    /// A price level's aggregate changed.
    PriceLevelChanged,
    /// Some mutation completed on the book.
    BookUpdated,
    /// The top-of-book depth window changed.
    DepthChanged,
    /// A checksummed snapshot package was produced.
    SnapshotCreated,
    /// Status report from an external order generator.
    GeneratorStatus,
}

impl EventKind {
    /// The filter bit for this kind.
    pub fn flag(&self) -> EventFilter {
        match self {
            EventKind::OrderAdded => EventFilter::ORDER_ADDED,
            EventKind::OrderModified => EventFilter::ORDER_MODIFIED,
            EventKind::OrderCancelled => EventFilter::ORDER_CANCELLED,
            EventKind::OrderFilled => EventFilter::ORDER_FILLED,
            EventKind::OrderExpired => EventFilter::ORDER_EXPIRED,
            EventKind::OrderRejected => EventFilter::ORDER_REJECTED,
            EventKind::TradeExecuted => EventFilter::TRADE_EXECUTED,
            EventKind::PriceLevelAdded => EventFilter::PRICE_LEVEL_ADDED,
            EventKind::PriceLevelRemoved => EventFilter::PRICE_LEVEL_REMOVED,
            EventKind::PriceLevelChanged => EventFilter::PRICE_LEVEL_CHANGED,
            EventKind::BookUpdated => EventFilter::BOOK_UPDATED,
            EventKind::DepthChanged => EventFilter::DEPTH_CHANGED,
            EventKind::SnapshotCreated => EventFilter::SNAPSHOT_CREATED,
            EventKind::GeneratorStatus => EventFilter::GENERATOR_STATUS,
        }
    }
}

bitflags! {
    /// Mask of event kinds for history queries and filtered subscriptions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventFilter: u16 {
        /// `ORDER_ADDED` events.
        const ORDER_ADDED = 1 << 0;
        /// `ORDER_MODIFIED` events.
        const ORDER_MODIFIED = 1 << 1;
        /// `ORDER_CANCELLED` events.
        const ORDER_CANCELLED = 1 << 2;
        /// `ORDER_FILLED` events.
        const ORDER_FILLED = 1 << 3;
        /// `ORDER_EXPIRED` events.
        const ORDER_EXPIRED = 1 << 4;
        /// `ORDER_REJECTED` events.
        const ORDER_REJECTED = 1 << 5;
        /// `TRADE_EXECUTED` events.
        const TRADE_EXECUTED = 1 << 6;
        /// `PRICE_LEVEL_ADDED` events.
        const PRICE_LEVEL_ADDED = 1 << 7;
        /// `PRICE_LEVEL_REMOVED` events.
        const PRICE_LEVEL_REMOVED = 1 << 8;
        /// `PRICE_LEVEL_CHANGED` events.
        const PRICE_LEVEL_CHANGED = 1 << 9;
        /// `BOOK_UPDATED` events.
        const BOOK_UPDATED = 1 << 10;
        /// `DEPTH_CHANGED` events.
        const DEPTH_CHANGED = 1 << 11;
        /// `SNAPSHOT_CREATED` events.
        const SNAPSHOT_CREATED = 1 << 12;
        /// `GENERATOR_STATUS` events.
        const GENERATOR_STATUS = 1 << 13;

        /// Every per-order lifecycle kind.
        const ORDER_LIFECYCLE = Self::ORDER_ADDED.bits()
            | Self::ORDER_MODIFIED.bits()
            | Self::ORDER_CANCELLED.bits()
            | Self::ORDER_FILLED.bits()
            | Self::ORDER_EXPIRED.bits()
            | Self::ORDER_REJECTED.bits();
        /// Every price-level kind.
        const LEVELS = Self::PRICE_LEVEL_ADDED.bits()
            | Self::PRICE_LEVEL_REMOVED.bits()
            | Self::PRICE_LEVEL_CHANGED.bits();
    }
}

/// A lifecycle event published by a book.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketEvent {
    /// An order rested in the book.
    OrderAdded {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
        /// The resting order as stored.
        order: Order,
    },
    /// An order was modified.
    OrderModified {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
        /// The order after the patch.
        order: Order,
        /// The patch moved it to the back of its queue.
        lost_priority: bool,
    },
    /// An order left the book before completing.
    OrderCancelled {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
        /// The cancelled order.
        order_id: OrderId,
        /// Its owner.
        user_id: UserId,
        /// Why it was cancelled.
        reason: CancelReason,
        /// Quantity discarded, in lots.
        remaining_quantity: u64,
    },
    /// An order received a fill.
    OrderFilled {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
        /// The filled order.
        order_id: OrderId,
        /// Its owner.
        user_id: UserId,
        /// Quantity filled by this event, in lots.
        filled_quantity: u64,
        /// Quantity still unfilled, in lots.
        remaining_quantity: u64,
        /// A market order ran out of opposing liquidity; the remainder was
        /// discarded.
        insufficient_liquidity: bool,
    },
    /// An order hit its deadline and was removed.
    OrderExpired {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
        /// The expired order.
        order_id: OrderId,
        /// Its owner.
        user_id: UserId,
        /// Quantity discarded, in lots.
        remaining_quantity: u64,
    },
    /// A submission was rejected; the book did not change.
    OrderRejected {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
        /// The rejected order id.
        order_id: OrderId,
        /// Machine-readable reason code.
        reason: String,
    },
    /// A maker/taker fill executed.
    TradeExecuted {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
        /// The trade record, fees included.
        trade: Trade,
    },
    /// A new price level appeared.
    PriceLevelAdded {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
        /// The level's side.
        side: Side,
        /// The level's price in ticks.
        price: u128,
    },
    /// A price level emptied and was removed.
    PriceLevelRemoved {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
        /// The level's side.
        side: Side,
        /// The level's price in ticks.
        price: u128,
    },
    /// A price level's aggregate changed.
    PriceLevelChanged {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
        /// The level's side.
        side: Side,
        /// The level's price in ticks.
        price: u128,
        /// Displayed quantity now at the level, in lots.
        quantity: u64,
        /// Orders now queued at the level.
        order_count: usize,
    },
    /// Some mutation completed on the book.
    BookUpdated {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
    },
    /// The watched top-of-book window changed.
    DepthChanged {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
        /// Top bid levels, best first, in ticks and lots.
        bids: Vec<LevelDepth>,
        /// Top ask levels, best first, in ticks and lots.
        asks: Vec<LevelDepth>,
    },
    /// A checksummed snapshot package was produced.
    SnapshotCreated {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
        /// Hex sha-256 of the package payload.
        checksum: String,
    },
    /// Status report from an external order generator, forwarded untouched.
    GeneratorStatus {
        /// Book symbol.
        symbol: String,
        /// Emission time, epoch milliseconds.
        timestamp: u64,
        /// Whether the generator is running.
        running: bool,
        /// Free-form status text.
        message: String,
    },
}

impl MarketEvent {
    /// This event's kind.
    pub fn kind(&self) -> EventKind {
        match self {
            MarketEvent::OrderAdded { .. } => EventKind::OrderAdded,
            MarketEvent::OrderModified { .. } => EventKind::OrderModified,
            MarketEvent::OrderCancelled { .. } => EventKind::OrderCancelled,
            MarketEvent::OrderFilled { .. } => EventKind::OrderFilled,
            MarketEvent::OrderExpired { .. } => EventKind::OrderExpired,
            MarketEvent::OrderRejected { .. } => EventKind::OrderRejected,
            MarketEvent::TradeExecuted { .. } => EventKind::TradeExecuted,
            MarketEvent::PriceLevelAdded { .. } => EventKind::PriceLevelAdded,
            MarketEvent::PriceLevelRemoved { .. } => EventKind::PriceLevelRemoved,
            MarketEvent::PriceLevelChanged { .. } => EventKind::PriceLevelChanged,
            MarketEvent::BookUpdated { .. } => EventKind::BookUpdated,
            MarketEvent::DepthChanged { .. } => EventKind::DepthChanged,
            MarketEvent::SnapshotCreated { .. } => EventKind::SnapshotCreated,
            MarketEvent::GeneratorStatus { .. } => EventKind::GeneratorStatus,
        }
    }

    /// The symbol of the book that published this event.
    pub fn symbol(&self) -> &str {
        match self {
            MarketEvent::OrderAdded { symbol, .. }
            | MarketEvent::OrderModified { symbol, .. }
            | MarketEvent::OrderCancelled { symbol, .. }
            | MarketEvent::OrderFilled { symbol, .. }
            | MarketEvent::OrderExpired { symbol, .. }
            | MarketEvent::OrderRejected { symbol, .. }
            | MarketEvent::TradeExecuted { symbol, .. }
            | MarketEvent::PriceLevelAdded { symbol, .. }
            | MarketEvent::PriceLevelRemoved { symbol, .. }
            | MarketEvent::PriceLevelChanged { symbol, .. }
            | MarketEvent::BookUpdated { symbol, .. }
            | MarketEvent::DepthChanged { symbol, .. }
            | MarketEvent::SnapshotCreated { symbol, .. }
            | MarketEvent::GeneratorStatus { symbol, .. } => symbol,
        }
    }

    /// Emission time, epoch milliseconds.
    pub fn timestamp(&self) -> u64 {
        match self {
            MarketEvent::OrderAdded { timestamp, .. }
            | MarketEvent::OrderModified { timestamp, .. }
            | MarketEvent::OrderCancelled { timestamp, .. }
            | MarketEvent::OrderFilled { timestamp, .. }
            | MarketEvent::OrderExpired { timestamp, .. }
            | MarketEvent::OrderRejected { timestamp, .. }
            | MarketEvent::TradeExecuted { timestamp, .. }
            | MarketEvent::PriceLevelAdded { timestamp, .. }
            | MarketEvent::PriceLevelRemoved { timestamp, .. }
            | MarketEvent::PriceLevelChanged { timestamp, .. }
            | MarketEvent::BookUpdated { timestamp, .. }
            | MarketEvent::DepthChanged { timestamp, .. }
            | MarketEvent::SnapshotCreated { timestamp, .. }
            | MarketEvent::GeneratorStatus { timestamp, .. } => *timestamp,
        }
    }

    /// The order this event concerns, when it concerns exactly one.
    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            MarketEvent::OrderAdded { order, .. } | MarketEvent::OrderModified { order, .. } => {
                Some(&order.id)
            }
            MarketEvent::OrderCancelled { order_id, .. }
            | MarketEvent::OrderFilled { order_id, .. }
            | MarketEvent::OrderExpired { order_id, .. }
            | MarketEvent::OrderRejected { order_id, .. } => Some(order_id),
            _ => None,
        }
    }
}
