//! Book statistics and operation latency tracking.
//!
//! Counters live inside the book's critical section; latencies are recorded
//! into a fixed-size `hdrhistogram` sketch in microseconds. `statistics()`
//! copies everything out, so the returned value is a consistent snapshot.

use hdrhistogram::Histogram;
use serde::Serialize;

/// Cumulative order lifecycle counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OrderCounts {
    /// Orders accepted by `submit` (resting, matched and parked alike).
    pub submitted: u64,
    /// Orders that rested in the book at least once.
    pub rested: u64,
    /// Orders removed by explicit or IOC cancellation.
    pub cancelled: u64,
    /// Orders removed by the expiry sweep.
    pub expired: u64,
    /// Submissions rejected without a state change.
    pub rejected: u64,
    /// Orders that filled completely.
    pub filled: u64,
}

/// Latency percentiles in microseconds.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LatencySummary {
    /// Median.
    pub p50: u64,
    /// 90th percentile.
    pub p90: u64,
    /// 99th percentile.
    pub p99: u64,
    /// Number of recorded operations.
    pub count: u64,
}

/// Consistent statistics snapshot returned by [`OrderBook::statistics`].
///
/// [`OrderBook::statistics`]: crate::OrderBook::statistics
#[derive(Debug, Clone, Serialize)]
pub struct BookStats {
    /// The book's symbol.
    pub symbol: String,
    /// Lifecycle counters.
    pub order_counts: OrderCounts,
    /// Trades executed since creation.
    pub trade_count: u64,
    /// Total traded quantity in display units.
    pub volume: f64,
    /// Orders currently resting.
    pub resting_orders: usize,
    /// Stops currently parked.
    pub parked_stops: usize,
    /// Best bid in display units.
    pub best_bid: Option<f64>,
    /// Best ask in display units.
    pub best_ask: Option<f64>,
    /// Best ask minus best bid.
    pub spread: Option<f64>,
    /// Midpoint of the best quotes.
    pub mid_price: Option<f64>,
    /// Price of the most recent trade.
    pub last_trade_price: Option<f64>,
    /// Latency percentiles over all mutating operations.
    pub latencies: LatencySummary,
}

/// Mutable counters owned by the book core.
#[derive(Debug)]
pub(crate) struct BookStatistics {
    pub orders: OrderCounts,
    pub trade_count: u64,
    /// Total traded quantity in lots.
    pub volume_lots: u128,
    latency: Histogram<u64>,
}

impl BookStatistics {
    pub(crate) fn new() -> Self {
        // Three significant figures up to an hour covers any realistic
        // single-operation latency.
        let latency = Histogram::new_with_bounds(1, 3_600_000_000, 3)
            .expect("static histogram bounds are valid");
        Self {
            orders: OrderCounts::default(),
            trade_count: 0,
            volume_lots: 0,
            latency,
        }
    }

    pub(crate) fn record_trade(&mut self, quantity: u64) {
        self.trade_count += 1;
        self.volume_lots = self.volume_lots.saturating_add(quantity as u128);
    }

    pub(crate) fn record_latency_micros(&mut self, micros: u64) {
        self.latency.saturating_record(micros.max(1));
    }

    pub(crate) fn latency_summary(&self) -> LatencySummary {
        if self.latency.is_empty() {
            return LatencySummary::default();
        }
        LatencySummary {
            p50: self.latency.value_at_quantile(0.50),
            p90: self.latency.value_at_quantile(0.90),
            p99: self.latency.value_at_quantile(0.99),
            count: self.latency.len(),
        }
    }
}
