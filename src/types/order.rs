//! Order model: plain data, no behavior dispatch.
//!
//! Resting orders are inert records. Everything that varies by order kind or
//! time-in-force is decided by the book's match driver, which keeps the level
//! queues free of trait objects and makes snapshots trivial clones.

use super::ids::{OrderId, UserId};
use crate::orderbook::OrderBookError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Side of the book an order belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Bid side.
    Buy,
    /// Ask side.
    Sell,
}

impl Side {
    /// The side an incoming order matches against.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// True for the bid side.
    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Side {
    type Err = OrderBookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" | "bid" => Ok(Side::Buy),
            "sell" | "ask" => Ok(Side::Sell),
            other => Err(OrderBookError::UnknownOrderType {
                value: other.to_string(),
            }),
        }
    }
}

/// How long an unfilled remainder persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Good till cancelled.
    #[default]
    Gtc,
    /// Immediate or cancel: fill what is possible, discard the rest.
    Ioc,
    /// Fill or kill: the whole quantity fills atomically or nothing does.
    Fok,
    /// Good till date: rests until an explicit deadline.
    Gtd,
    /// Good for the trading day: rests until the configured session close.
    Day,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
            TimeInForce::Gtd => "GTD",
            TimeInForce::Day => "DAY",
        };
        f.write_str(s)
    }
}

/// Order kind vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    /// Rests at a limit price.
    Limit,
    /// Crosses unconditionally, never rests.
    Market,
    /// Parks until the trigger price, then becomes a limit order.
    StopLimit,
    /// Parks until the trigger price, then becomes a market order.
    StopMarket,
    /// Limit order with a displayed slice smaller than its full quantity.
    Iceberg,
    /// Stop-market whose trigger ratchets with favorable price movement.
    TrailingStop,
}

impl OrderKind {
    /// Whether this kind parks in the stop table before entering the book.
    pub fn is_stop(&self) -> bool {
        matches!(
            self,
            OrderKind::StopLimit | OrderKind::StopMarket | OrderKind::TrailingStop
        )
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderKind::Limit => "limit",
            OrderKind::Market => "market",
            OrderKind::StopLimit => "stop_limit",
            OrderKind::StopMarket => "stop_market",
            OrderKind::Iceberg => "iceberg",
            OrderKind::TrailingStop => "trailing_stop",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderKind {
    type Err = OrderBookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "limit" => Ok(OrderKind::Limit),
            "market" => Ok(OrderKind::Market),
            "stop_limit" | "stop-limit" => Ok(OrderKind::StopLimit),
            "stop_market" | "stop-market" | "stop" => Ok(OrderKind::StopMarket),
            "iceberg" => Ok(OrderKind::Iceberg),
            "trailing_stop" | "trailing-stop" => Ok(OrderKind::TrailingStop),
            other => Err(OrderBookError::UnknownOrderType {
                value: other.to_string(),
            }),
        }
    }
}

/// A single order, immutable after creation except for the quantity fields
/// the matching engine maintains.
///
/// Prices are ticks and quantities lots at the owning book's [`Scale`];
/// `sequence` is assigned by the book on acceptance and defines time
/// priority among equal prices.
///
/// [`Scale`]: super::Scale
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    /// Unique identifier within the book.
    pub id: OrderId,
    /// Buy or sell.
    pub side: Side,
    /// Order kind.
    pub kind: OrderKind,
    /// Limit price in ticks. Zero and unused for pure market orders.
    pub price: u128,
    /// Trigger price in ticks. Present iff `kind.is_stop()`.
    pub stop_price: Option<u128>,
    /// Remaining quantity in lots. Positive while the order is live.
    pub quantity: u64,
    /// Quantity at submission, immutable.
    pub original_quantity: u64,
    /// Iceberg slice size in lots. `None` for fully displayed orders.
    pub display_size: Option<u64>,
    /// Currently displayed quantity, `<= quantity`.
    pub displayed_quantity: u64,
    /// Residual persistence policy.
    pub time_in_force: TimeInForce,
    /// Expiry deadline in epoch milliseconds. Required for GTD.
    pub expiry_time: Option<u64>,
    /// Owner identity.
    pub user_id: UserId,
    /// Wall-clock submission time in epoch milliseconds.
    pub timestamp: u64,
    /// Book-assigned arrival sequence; defines time priority.
    pub sequence: u64,
    /// Reject instead of trading on arrival.
    pub post_only: bool,
    /// Trailing distance: ticks, or basis points of the reference price
    /// when `trail_is_percent`.
    pub trail_value: Option<u64>,
    /// Interpret `trail_value` as basis points.
    pub trail_is_percent: bool,
}

impl Order {
    /// Whether the order has no remaining quantity.
    pub fn is_filled(&self) -> bool {
        self.quantity == 0
    }

    /// Reduce the remaining quantity by a fill and refresh the displayed
    /// slice. Iceberg refills keep queue position.
    pub(crate) fn fill(&mut self, quantity: u64) {
        self.quantity = self.quantity.saturating_sub(quantity);
        self.refresh_display();
    }

    /// Recompute `displayed_quantity` from the slice size and remainder.
    pub(crate) fn refresh_display(&mut self) {
        self.displayed_quantity = match self.display_size {
            Some(slice) => slice.min(self.quantity),
            None => self.quantity,
        };
    }
}

/// Client-facing order submission, in display units.
///
/// Built through the constructors plus `with_*` combinators; validated and
/// scaled by [`OrderBook::submit`].
///
/// [`OrderBook::submit`]: crate::OrderBook::submit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Caller-chosen identifier; generated when absent.
    pub id: Option<String>,
    /// Buy or sell.
    pub side: Side,
    /// Order kind.
    pub kind: OrderKind,
    /// Limit price. `None` for pure market orders. `+inf` on a buy and `0`
    /// on a sell are accepted as market-order sentinels.
    pub price: Option<f64>,
    /// Trigger price for stop kinds.
    pub stop_price: Option<f64>,
    /// Quantity, must be positive and exact at the book's precision.
    pub quantity: f64,
    /// Displayed slice for iceberg orders.
    pub display_quantity: Option<f64>,
    /// Residual persistence policy.
    #[serde(default)]
    pub time_in_force: TimeInForce,
    /// Expiry deadline in epoch milliseconds (GTD).
    pub expiry_time: Option<u64>,
    /// Owner identity.
    pub user_id: Option<String>,
    /// Reject instead of trading on arrival.
    #[serde(default)]
    pub post_only: bool,
    /// Trailing distance for trailing stops.
    pub trail_value: Option<f64>,
    /// Interpret `trail_value` as a percentage (basis points).
    #[serde(default)]
    pub trail_is_percent: bool,
}

impl OrderSpec {
    fn base(side: Side, kind: OrderKind, quantity: f64) -> Self {
        Self {
            id: None,
            side,
            kind,
            price: None,
            stop_price: None,
            quantity,
            display_quantity: None,
            time_in_force: TimeInForce::Gtc,
            expiry_time: None,
            user_id: None,
            post_only: false,
            trail_value: None,
            trail_is_percent: false,
        }
    }

    /// A limit order.
    pub fn limit(side: Side, price: f64, quantity: f64) -> Self {
        let mut spec = Self::base(side, OrderKind::Limit, quantity);
        spec.price = Some(price);
        spec
    }

    /// A market order.
    pub fn market(side: Side, quantity: f64) -> Self {
        Self::base(side, OrderKind::Market, quantity)
    }

    /// An iceberg order displaying `display_quantity` at a time.
    pub fn iceberg(side: Side, price: f64, quantity: f64, display_quantity: f64) -> Self {
        let mut spec = Self::base(side, OrderKind::Iceberg, quantity);
        spec.price = Some(price);
        spec.display_quantity = Some(display_quantity);
        spec
    }

    /// A stop-limit order: parks at `stop_price`, rests at `price` once
    /// triggered.
    pub fn stop_limit(side: Side, stop_price: f64, price: f64, quantity: f64) -> Self {
        let mut spec = Self::base(side, OrderKind::StopLimit, quantity);
        spec.stop_price = Some(stop_price);
        spec.price = Some(price);
        spec
    }

    /// A stop-market order.
    pub fn stop_market(side: Side, stop_price: f64, quantity: f64) -> Self {
        let mut spec = Self::base(side, OrderKind::StopMarket, quantity);
        spec.stop_price = Some(stop_price);
        spec
    }

    /// A trailing stop. `trail_value` is an absolute price distance, or a
    /// percentage in basis points when `trail_is_percent`.
    pub fn trailing_stop(side: Side, trail_value: f64, trail_is_percent: bool, quantity: f64) -> Self {
        let mut spec = Self::base(side, OrderKind::TrailingStop, quantity);
        spec.trail_value = Some(trail_value);
        spec.trail_is_percent = trail_is_percent;
        spec
    }

    /// Use a caller-chosen order id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach an owner identity.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Override the time-in-force.
    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    /// Set a GTD expiry deadline in epoch milliseconds.
    pub fn with_expiry(mut self, expiry_time: u64) -> Self {
        self.expiry_time = Some(expiry_time);
        self.time_in_force = TimeInForce::Gtd;
        self
    }

    /// Mark the order post-only.
    pub fn with_post_only(mut self) -> Self {
        self.post_only = true;
        self
    }
}

/// Requested changes for [`OrderBook::modify`]. All present fields apply
/// atomically or none do.
///
/// [`OrderBook::modify`]: crate::OrderBook::modify
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderPatch {
    /// New limit price.
    pub price: Option<f64>,
    /// New total quantity. Zero cancels the order.
    pub quantity: Option<f64>,
    /// New expiry deadline in epoch milliseconds.
    pub expiry_time: Option<u64>,
}

impl OrderPatch {
    /// A price-only patch.
    pub fn price(price: f64) -> Self {
        Self {
            price: Some(price),
            ..Self::default()
        }
    }

    /// A quantity-only patch.
    pub fn quantity(quantity: f64) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::default()
        }
    }

    /// An expiry-only patch.
    pub fn expiry(expiry_time: u64) -> Self {
        Self {
            expiry_time: Some(expiry_time),
            ..Self::default()
        }
    }

    /// Set the price on an existing patch.
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Set the quantity on an existing patch.
    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// True when no field is set.
    pub fn is_empty(&self) -> bool {
        self.price.is_none() && self.quantity.is_none() && self.expiry_time.is_none()
    }
}
