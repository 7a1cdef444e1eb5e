//! Port Interfaces
//!
//! Interfaces for the streaming transport, following the Hexagonal
//! Architecture pattern. The connection manager drives these ports; the
//! `infrastructure::openalgo::transport` module provides the
//! tokio-tungstenite adapter, and integration tests provide in-process
//! fakes for failure injection.

use async_trait::async_trait;

/// A message on the streaming transport.
///
/// Deliberately smaller than a full WebSocket message set: the client only
/// needs text frames and keep-alive probes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// A text frame carrying one JSON-encoded message.
    Text(String),
    /// Keep-alive probe.
    Ping(Vec<u8>),
    /// Keep-alive probe response.
    Pong(Vec<u8>),
    /// The peer is closing the connection.
    Close,
}

/// Errors surfaced by the transport ports.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Opening the connection failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Sending a message failed.
    #[error("send failed: {0}")]
    Send(String),

    /// The connection is closed.
    #[error("connection closed")]
    Closed,

    /// The peer violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Outbound half of a live connection.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one message.
    async fn send(&mut self, message: WireMessage) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Inbound half of a live connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Wait for the next message. `None` means the stream has ended.
    async fn next(&mut self) -> Option<Result<WireMessage, TransportError>>;
}

/// Boxed outbound half.
pub type BoxedSink = Box<dyn FrameSink>;

/// Boxed inbound half.
pub type BoxedStream = Box<dyn FrameStream>;

/// Factory for live connections.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Open a connection to `url` and return its two halves.
    async fn connect(&self, url: &str) -> Result<(BoxedSink, BoxedStream), TransportError>;
}
