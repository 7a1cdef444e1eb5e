#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! OpenAlgo Stream Client - Market Data Streaming
//!
//! A persistent streaming-data client that maintains a single multiplexed
//! WebSocket connection to an OpenAlgo market-data server, manages
//! per-symbol subscriptions across three data kinds (LTP, quote, depth),
//! demultiplexes inbound frames to cached state and registered callbacks,
//! and recovers transparently from connection loss.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core streaming logic and data types
//!   - `market_data`: Typed tick payloads (LTP, quote, depth)
//!   - `subscription`: Registry, symbol keys, callback contract
//!   - `cache`: Latest-value stores
//!
//! - **Application**: Port definitions
//!   - `ports`: Transport interfaces the connection manager drives
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `openalgo`: WebSocket client, codec, dispatcher, reconnection
//!   - `config`: Environment-driven settings
//!   - `telemetry`: Tracing subscriber setup
//!   - `metrics`: Instrumentation helpers
//!
//! # Data Flow
//!
//! ```text
//!                       ┌─────────────┐     ┌──────────────┐
//! OpenAlgo WS ─────────►│  Read Loop  │────►│  Dispatcher  │──► Callbacks
//!        ▲              └─────────────┘     └──────┬───────┘
//!        │                                         │
//!   subscribe /                                    ▼
//!   unsubscribe ◄── Subscription Registry    Latest-Value Caches
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use openalgo_stream_client::{Credential, StreamClient, StreamSettings, callback};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = StreamSettings::new(
//!     "ws://127.0.0.1:8765",
//!     Credential::new("api-key")?,
//! )?;
//! let client = StreamClient::initialize(settings).await;
//!
//! client
//!     .subscribe_ltp("NSE", "INFY", callback(|event| {
//!         println!("{}:{} -> {:?}", event.exchange(), event.symbol(), event.kind());
//!         Ok(())
//!     }))
//!     .await?;
//!
//! // ... later
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no transport dependencies.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::cache::{LatestValueCache, TickCaches};
pub use domain::market_data::{DepthLevel, DepthTick, LtpTick, QuoteTick};
pub use domain::subscription::{
    CallbackError, DepthUpdate, LtpUpdate, QuoteUpdate, RegistryStats, SubscriptionKind,
    SubscriptionRegistry, SymbolKey, SymbolKeyError, TickCallback, TickEvent, callback,
    channel_callback,
};

// Transport ports (for custom connectors and test fakes)
pub use application::ports::{
    BoxedSink, BoxedStream, FrameSink, FrameStream, StreamConnector, TransportError, WireMessage,
};

// Client facade
pub use infrastructure::openalgo::client::{ClientError, ConnectionState, StreamClient};

// Wire types (for integration tests and advanced consumers)
pub use infrastructure::openalgo::codec::{CodecError, Decoded, JsonCodec};
pub use infrastructure::openalgo::messages::{
    AckFrame, ErrorFrame, Instrument, StreamFrame, SubscriptionRequest, WireAction,
};

// Configuration
pub use infrastructure::config::{
    ChannelSettings, ConfigError, Credential, StreamSettings, WebSocketSettings,
};
