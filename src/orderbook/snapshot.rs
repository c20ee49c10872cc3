//! Point-in-time views of the book.
//!
//! The snapshot format is wire-stable JSON: bids descending, asks ascending,
//! prices and quantities in display units, timestamp in fractional seconds.
//! The displayed depth view is the default, so iceberg reserves stay hidden.
//!
//! [`SnapshotPackage`] wraps a snapshot with a format version and a sha-256
//! checksum for integrity-checked hand-off to persistence or recovery.

use super::error::OrderBookError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One aggregated level row in display units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthRow {
    /// Level price.
    pub price: f64,
    /// Aggregate quantity at the level.
    pub quantity: f64,
    /// Number of orders queued at the level.
    pub order_count: usize,
}

/// Immutable view of both sides at one instant, taken under the book's lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    /// The book's symbol.
    pub symbol: String,
    /// Capture time as fractional epoch seconds.
    pub timestamp: f64,
    /// Bid levels, best (highest) first.
    pub bids: Vec<DepthRow>,
    /// Ask levels, best (lowest) first.
    pub asks: Vec<DepthRow>,
}

impl BookSnapshot {
    /// Best bid price and quantity.
    pub fn best_bid(&self) -> Option<(f64, f64)> {
        self.bids.first().map(|row| (row.price, row.quantity))
    }

    /// Best ask price and quantity.
    pub fn best_ask(&self) -> Option<(f64, f64)> {
        self.asks.first().map(|row| (row.price, row.quantity))
    }

    /// Best ask minus best bid.
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask - bid),
            _ => None,
        }
    }

    /// Midpoint of the best quotes.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    /// Serialize to the wire format.
    pub fn to_json(&self) -> Result<String, OrderBookError> {
        serde_json::to_string(self).map_err(|error| OrderBookError::Serialization {
            message: error.to_string(),
        })
    }

    /// Side arrays only, timestamp excluded. Two snapshots of an unchanged
    /// book compare equal under this view.
    pub fn sides(&self) -> (&[DepthRow], &[DepthRow]) {
        (&self.bids, &self.asks)
    }
}

/// Format version carried by checksummed snapshot packages.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A [`BookSnapshot`] wrapped with a version and sha-256 checksum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPackage {
    /// Schema version for forward compatibility.
    pub version: u32,
    /// The snapshot payload.
    pub snapshot: BookSnapshot,
    /// Hex-encoded sha-256 of the serialized payload.
    pub checksum: String,
}

impl SnapshotPackage {
    /// Wrap a snapshot, computing its checksum.
    pub fn new(snapshot: BookSnapshot) -> Result<Self, OrderBookError> {
        let checksum = Self::compute_checksum(&snapshot)?;
        Ok(Self {
            version: SNAPSHOT_FORMAT_VERSION,
            snapshot,
            checksum,
        })
    }

    /// Serialize the package to JSON.
    pub fn to_json(&self) -> Result<String, OrderBookError> {
        serde_json::to_string(self).map_err(|error| OrderBookError::Serialization {
            message: error.to_string(),
        })
    }

    /// Deserialize a package from JSON. Call [`Self::validate`] afterwards.
    pub fn from_json(data: &str) -> Result<Self, OrderBookError> {
        serde_json::from_str(data).map_err(|error| OrderBookError::Serialization {
            message: error.to_string(),
        })
    }

    /// Check the version and recompute the checksum.
    pub fn validate(&self) -> Result<(), OrderBookError> {
        if self.version != SNAPSHOT_FORMAT_VERSION {
            return Err(OrderBookError::Serialization {
                message: format!(
                    "unsupported snapshot version {} (expected {})",
                    self.version, SNAPSHOT_FORMAT_VERSION
                ),
            });
        }
        let computed = Self::compute_checksum(&self.snapshot)?;
        if computed != self.checksum {
            return Err(OrderBookError::ChecksumMismatch {
                expected: self.checksum.clone(),
                actual: computed,
            });
        }
        Ok(())
    }

    fn compute_checksum(snapshot: &BookSnapshot) -> Result<String, OrderBookError> {
        let payload =
            serde_json::to_vec(snapshot).map_err(|error| OrderBookError::Serialization {
                message: error.to_string(),
            })?;
        let digest = Sha256::digest(&payload);
        Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
    }
}
