//! Order book error types.
//!
//! Every failure is value-returning. Validation errors reject before any
//! mutation, semantic rejections leave the book untouched and are also
//! published as `ORDER_REJECTED` events, lookup errors return silently, and
//! `Poisoned` is terminal: once a panic escapes inside the critical section
//! the book refuses all further operations.

use crate::types::{OrderId, OrderKind, Side};
use thiserror::Error;

/// Errors surfaced by [`OrderBook`] and [`MarketRegistry`] operations.
///
/// [`OrderBook`]: crate::OrderBook
/// [`MarketRegistry`]: crate::MarketRegistry
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum OrderBookError {
    /// A price or quantity is not exact at the configured precision.
    #[error("invalid precision: {field} {value} is not exact at {precision} decimal places")]
    InvalidPrecision {
        /// Which input failed ("price", "stop_price", "quantity", ...).
        field: &'static str,
        /// The offending display value.
        value: f64,
        /// The configured number of decimal places.
        precision: u32,
    },

    /// Quantity is zero, negative or non-finite.
    #[error("invalid quantity: {value}")]
    InvalidQuantity {
        /// The offending display value.
        value: f64,
    },

    /// An order with this id is already live in the book.
    #[error("duplicate order id: {0}")]
    DuplicateOrderId(OrderId),

    /// Unrecognized order kind or side in a string submission.
    #[error("unknown order type: {value}")]
    UnknownOrderType {
        /// The unparseable input.
        value: String,
    },

    /// A required field is absent for this order kind.
    #[error("{kind} order requires a {field}")]
    MissingField {
        /// The order kind being validated.
        kind: OrderKind,
        /// The missing field name.
        field: &'static str,
    },

    /// A fill-or-kill order could not be filled in full.
    #[error("fill-or-kill unfillable: requested {requested}, available {available}")]
    FokUnfillable {
        /// Quantity requested, in lots.
        requested: u64,
        /// Quantity available at crossing prices, in lots.
        available: u64,
    },

    /// A post-only order would have traded on arrival.
    #[error("post-only order would cross opposite level at {opposite_price}")]
    PostOnlyWouldCross {
        /// The best opposite price it would have crossed, in ticks.
        opposite_price: u128,
    },

    /// A market order found no opposing liquidity at all.
    #[error("insufficient liquidity: {side} market order for {requested} lots found nothing to match")]
    InsufficientLiquidity {
        /// Side of the market order.
        side: Side,
        /// Requested quantity in lots.
        requested: u64,
    },

    /// A GTD order's deadline is not strictly in the future.
    #[error("GTD expiry {expiry_time} is not after the current time {now}")]
    GtdExpiryInPast {
        /// The requested deadline, epoch milliseconds.
        expiry_time: u64,
        /// The submission time, epoch milliseconds.
        now: u64,
    },

    /// No live order with this id.
    #[error("order not found: {0}")]
    NotFound(OrderId),

    /// A modify request that changes nothing or cannot be applied.
    #[error("invalid patch: {message}")]
    InvalidPatch {
        /// What made the patch unusable.
        message: String,
    },

    /// No book registered under this symbol.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// A book already exists under this symbol.
    #[error("symbol already registered: {0}")]
    SymbolExists(String),

    /// Snapshot (de)serialization failure.
    #[error("serialization error: {message}")]
    Serialization {
        /// Underlying serializer message.
        message: String,
    },

    /// Snapshot integrity check failed.
    #[error("checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch {
        /// Checksum recorded in the package.
        expected: String,
        /// Checksum computed from the payload.
        actual: String,
    },

    /// A panic occurred inside the book's critical section. The book is
    /// unusable and requires external recovery.
    #[error("order book poisoned; refusing further operations")]
    Poisoned,
}

impl OrderBookError {
    /// Stable machine-readable code, used as the reason on
    /// `ORDER_REJECTED` events.
    pub fn code(&self) -> &'static str {
        match self {
            OrderBookError::InvalidPrecision { .. } => "INVALID_PRECISION",
            OrderBookError::InvalidQuantity { .. } => "INVALID_QUANTITY",
            OrderBookError::DuplicateOrderId(_) => "DUPLICATE_ORDER_ID",
            OrderBookError::UnknownOrderType { .. } => "UNKNOWN_ORDER_TYPE",
            OrderBookError::MissingField { .. } => "MISSING_FIELD",
            OrderBookError::FokUnfillable { .. } => "FOK_UNFILLABLE",
            OrderBookError::PostOnlyWouldCross { .. } => "POST_ONLY_WOULD_CROSS",
            OrderBookError::InsufficientLiquidity { .. } => "MARKET_INSUFFICIENT_LIQUIDITY",
            OrderBookError::GtdExpiryInPast { .. } => "GTD_EXPIRY_IN_PAST",
            OrderBookError::NotFound(_) => "NOT_FOUND",
            OrderBookError::InvalidPatch { .. } => "INVALID_PATCH",
            OrderBookError::UnknownSymbol(_) => "UNKNOWN_SYMBOL",
            OrderBookError::SymbolExists(_) => "SYMBOL_EXISTS",
            OrderBookError::Serialization { .. } => "SERIALIZATION_ERROR",
            OrderBookError::ChecksumMismatch { .. } => "CHECKSUM_MISMATCH",
            OrderBookError::Poisoned => "POISONED",
        }
    }
}
