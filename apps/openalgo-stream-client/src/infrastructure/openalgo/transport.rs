//! WebSocket Transport Adapter
//!
//! tokio-tungstenite implementation of the transport ports. The connection
//! is split into sink and stream halves so the read loop can select over
//! inbound messages while other branches write.

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{
    BoxedSink, BoxedStream, FrameSink, FrameStream, StreamConnector, TransportError, WireMessage,
};

type WsStreamInner = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector that opens real WebSocket connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StreamConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<(BoxedSink, BoxedStream), TransportError> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (write, read) = ws_stream.split();

        Ok((
            Box::new(WsSink { inner: write }),
            Box::new(WsStream { inner: read }),
        ))
    }
}

/// Outbound half of a tungstenite connection.
struct WsSink {
    inner: SplitSink<WsStreamInner, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, message: WireMessage) -> Result<(), TransportError> {
        let message = match message {
            WireMessage::Text(text) => Message::Text(text.into()),
            WireMessage::Ping(payload) => Message::Ping(payload.into()),
            WireMessage::Pong(payload) => Message::Pong(payload.into()),
            WireMessage::Close => Message::Close(None),
        };

        self.inner
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner
            .close()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

/// Inbound half of a tungstenite connection.
struct WsStream {
    inner: SplitStream<WsStreamInner>,
}

#[async_trait]
impl FrameStream for WsStream {
    async fn next(&mut self) -> Option<Result<WireMessage, TransportError>> {
        loop {
            return match self.inner.next().await? {
                Ok(Message::Text(text)) => Some(Ok(WireMessage::Text(text.as_str().to_owned()))),
                Ok(Message::Ping(payload)) => Some(Ok(WireMessage::Ping(payload.to_vec()))),
                Ok(Message::Pong(payload)) => Some(Ok(WireMessage::Pong(payload.to_vec()))),
                Ok(Message::Close(_)) => Some(Ok(WireMessage::Close)),
                // The protocol is text-only; other message types carry
                // nothing the client can use.
                Ok(Message::Binary(_) | Message::Frame(_)) => continue,
                Err(e) => Some(Err(TransportError::Protocol(e.to_string()))),
            };
        }
    }
}
