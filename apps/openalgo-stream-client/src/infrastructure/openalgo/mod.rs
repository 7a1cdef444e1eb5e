//! OpenAlgo WebSocket Client
//!
//! Adapter for the OpenAlgo streaming protocol: JSON frames over a single
//! multiplexed WebSocket connection.

/// Connection lifecycle, read loop, and the public facade.
pub mod client;

/// Boundary decoding of inbound frames.
pub mod codec;

/// Cache updates and callback fan-out.
pub mod dispatcher;

/// Keep-alive probe management.
pub mod heartbeat;

/// Wire frame types.
pub mod messages;

/// Bounded reconnection policy.
pub mod reconnect;

/// tokio-tungstenite port adapter.
pub mod transport;

pub use client::{ConnectionState, StreamClient};
