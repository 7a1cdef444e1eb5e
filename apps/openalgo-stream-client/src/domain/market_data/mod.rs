//! Market Data Payload Types
//!
//! Typed records for the three streaming data kinds. Each record maps
//! directly to the flat JSON shape the server sends; fields the client does
//! not model are preserved in `extra` rather than dropped, so subscribers
//! that need a vendor-specific field can still reach it.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {"type": "ltp", "exchange": "NSE", "symbol": "INFY", "ltp": 1500.5}
//! {"type": "quote", "exchange": "NSE", "symbol": "INFY",
//!  "open": 1490.0, "high": 1505.0, "low": 1488.2, "close": 1495.0,
//!  "ltp": 1500.5, "volume": 1250000}
//! {"type": "depth", "exchange": "NSE", "symbol": "INFY",
//!  "bids": [{"price": 1500.4, "quantity": 120}],
//!  "asks": [{"price": 1500.6, "quantity": 80}]}
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// LTP
// =============================================================================

/// Last traded price update for a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LtpTick {
    /// Exchange code (NSE, BSE, NFO, ...).
    pub exchange: String,

    /// Trading symbol.
    pub symbol: String,

    /// Last traded price.
    pub ltp: Decimal,

    /// Exchange timestamp, when the server includes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Fields the client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Quote
// =============================================================================

/// OHLC + volume snapshot for a single instrument.
///
/// All price fields are optional: servers differ in which fields they
/// populate outside market hours, and a partially filled quote is still a
/// valid cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteTick {
    /// Exchange code.
    pub exchange: String,

    /// Trading symbol.
    pub symbol: String,

    /// Last traded price, when the quote carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ltp: Option<Decimal>,

    /// Session open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,

    /// Session high.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,

    /// Session low.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,

    /// Previous close.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<Decimal>,

    /// Traded volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,

    /// Exchange timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Fields the client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// Depth
// =============================================================================

/// One price level of an order book ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    /// Level price.
    pub price: Decimal,

    /// Quantity resting at this level.
    pub quantity: u64,

    /// Number of orders at this level, when the feed reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<u32>,
}

/// Order book snapshot for a single instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthTick {
    /// Exchange code.
    pub exchange: String,

    /// Trading symbol.
    pub symbol: String,

    /// Bid ladder, best bid first.
    #[serde(default, alias = "buy")]
    pub bids: Vec<DepthLevel>,

    /// Ask ladder, best ask first.
    #[serde(default, alias = "sell")]
    pub asks: Vec<DepthLevel>,

    /// Exchange timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Fields the client does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DepthTick {
    /// Best bid level, if the ladder is non-empty.
    #[must_use]
    pub fn best_bid(&self) -> Option<&DepthLevel> {
        self.bids.first()
    }

    /// Best ask level, if the ladder is non-empty.
    #[must_use]
    pub fn best_ask(&self) -> Option<&DepthLevel> {
        self.asks.first()
    }
}
