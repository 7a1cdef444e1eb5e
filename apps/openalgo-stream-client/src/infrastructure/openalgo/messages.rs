//! OpenAlgo Wire Message Types
//!
//! Frame types for the OpenAlgo streaming protocol. Every frame is a single
//! JSON object; inbound frames carry a `type` discriminator, outbound
//! requests carry an `action`.
//!
//! # Wire Format (JSON)
//!
//! Outbound:
//! ```json
//! {"action": "subscribe", "type": "ltp",
//!  "instruments": [{"exchange": "NSE", "symbol": "INFY"}]}
//! ```
//!
//! Inbound control:
//! ```json
//! {"type": "error", "message": "unknown instrument"}
//! {"type": "subscribed", "mode": "ltp"}
//! {"type": "unsubscribed", "mode": "ltp"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::market_data::{DepthTick, LtpTick, QuoteTick};
use crate::domain::subscription::{SubscriptionKind, SymbolKey};

// =============================================================================
// Inbound Frames
// =============================================================================

/// A decoded inbound frame, tagged by its wire `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Last traded price update.
    Ltp(LtpTick),
    /// Quote update.
    Quote(QuoteTick),
    /// Order book depth update.
    Depth(DepthTick),
    /// Server-side error report. Informational only.
    Error(ErrorFrame),
    /// Subscription acknowledgment. Informational only.
    Subscribed(AckFrame),
    /// Unsubscription acknowledgment. Informational only.
    Unsubscribed(AckFrame),
}

/// Error report from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorFrame {
    /// Human-readable error description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Remaining frame fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Subscribe/unsubscribe acknowledgment from the server.
///
/// The shape varies across server versions, so everything is kept as raw
/// fields and only logged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AckFrame {
    /// Raw acknowledgment fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

// =============================================================================
// Outbound Requests
// =============================================================================

/// One instrument reference in a wire request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Exchange code.
    pub exchange: String,
    /// Trading symbol.
    pub symbol: String,
}

impl From<&SymbolKey> for Instrument {
    fn from(key: &SymbolKey) -> Self {
        Self {
            exchange: key.exchange().to_string(),
            symbol: key.symbol().to_string(),
        }
    }
}

/// Wire request action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireAction {
    /// Begin streaming the listed instruments.
    Subscribe,
    /// Stop streaming the listed instruments.
    Unsubscribe,
}

impl WireAction {
    /// Wire name of this action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

/// Outbound subscribe/unsubscribe request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Request action.
    pub action: WireAction,

    /// Data kind, by wire name.
    #[serde(rename = "type")]
    pub kind: String,

    /// Instruments this request concerns.
    pub instruments: Vec<Instrument>,
}

impl SubscriptionRequest {
    /// Build a subscribe request for one instrument.
    #[must_use]
    pub fn subscribe(kind: SubscriptionKind, key: &SymbolKey) -> Self {
        Self {
            action: WireAction::Subscribe,
            kind: kind.as_str().to_string(),
            instruments: vec![Instrument::from(key)],
        }
    }

    /// Build an unsubscribe request for one instrument.
    #[must_use]
    pub fn unsubscribe(kind: SubscriptionKind, key: &SymbolKey) -> Self {
        Self {
            action: WireAction::Unsubscribe,
            kind: kind.as_str().to_string(),
            instruments: vec![Instrument::from(key)],
        }
    }

    /// Serialize to the wire encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
