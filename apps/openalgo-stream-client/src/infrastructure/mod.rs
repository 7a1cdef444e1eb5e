//! Infrastructure Layer - Adapters and external integrations.

/// OpenAlgo WebSocket client: connection manager, codec, dispatcher.
pub mod openalgo;

/// Configuration from environment variables.
pub mod config;

/// Metrics instrumentation.
pub mod metrics;

/// Tracing subscriber initialization.
pub mod telemetry;
