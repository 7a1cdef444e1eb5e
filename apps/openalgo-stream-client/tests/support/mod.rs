//! In-process fake transport for integration tests.
//!
//! Implements the public transport ports over channels so tests can inject
//! inbound frames, observe outbound requests, and simulate connection loss
//! without a network.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use openalgo_stream_client::{
    BoxedSink, BoxedStream, FrameSink, FrameStream, StreamConnector, TransportError, WireMessage,
};

type InboundTx = mpsc::UnboundedSender<Result<WireMessage, TransportError>>;

struct ServerInner {
    sent: Mutex<Vec<String>>,
    connect_attempts: AtomicU32,
    fail_connects: AtomicU32,
    inbound: Mutex<Option<InboundTx>>,
}

/// Scriptable fake stream server.
///
/// One `FakeServer` backs any number of sequential connections; dropping a
/// connection and letting the client reconnect installs a fresh inbound
/// channel. The handle is cheap to clone.
#[derive(Clone)]
pub struct FakeServer {
    inner: Arc<ServerInner>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ServerInner {
                sent: Mutex::new(Vec::new()),
                connect_attempts: AtomicU32::new(0),
                fail_connects: AtomicU32::new(0),
                inbound: Mutex::new(None),
            }),
        }
    }

    /// Connector handing out connections backed by this server.
    pub fn connector(&self) -> Arc<FakeConnector> {
        Arc::new(FakeConnector {
            server: self.clone(),
        })
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.inner.fail_connects.store(n, Ordering::SeqCst);
    }

    /// Total connection attempts, including failed ones.
    pub fn connect_attempts(&self) -> u32 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    /// Whether a connection is currently live.
    pub fn has_connection(&self) -> bool {
        self.inner.inbound.lock().unwrap().is_some()
    }

    /// Inject one inbound JSON frame.
    pub fn send_json(&self, value: &serde_json::Value) {
        self.send_raw(&value.to_string());
    }

    /// Inject one inbound text frame verbatim.
    pub fn send_raw(&self, text: &str) {
        if let Some(tx) = self.inner.inbound.lock().unwrap().as_ref() {
            let _ = tx.send(Ok(WireMessage::Text(text.to_string())));
        }
    }

    /// Sever the live connection; the client sees the stream end.
    pub fn drop_connection(&self) {
        *self.inner.inbound.lock().unwrap() = None;
    }

    /// Outbound text frames the client has sent, as parsed JSON.
    pub fn sent_requests(&self) -> Vec<serde_json::Value> {
        self.inner
            .sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|text| serde_json::from_str(text).ok())
            .collect()
    }

    /// Forget previously recorded outbound frames.
    pub fn clear_sent(&self) {
        self.inner.sent.lock().unwrap().clear();
    }

    /// Count outbound requests matching an action/kind/instrument.
    pub fn count_requests(&self, action: &str, kind: &str, exchange: &str, symbol: &str) -> usize {
        self.sent_requests()
            .iter()
            .filter(|request| {
                request["action"] == action
                    && request["type"] == kind
                    && request["instruments"][0]["exchange"] == exchange
                    && request["instruments"][0]["symbol"] == symbol
            })
            .count()
    }

    /// Count all outbound requests with an action.
    pub fn count_action(&self, action: &str) -> usize {
        self.sent_requests()
            .iter()
            .filter(|request| request["action"] == action)
            .count()
    }
}

/// Connector handing out fake connections.
pub struct FakeConnector {
    server: FakeServer,
}

#[async_trait]
impl StreamConnector for FakeConnector {
    async fn connect(&self, _url: &str) -> Result<(BoxedSink, BoxedStream), TransportError> {
        let inner = &self.server.inner;
        inner.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let remaining = inner.fail_connects.load(Ordering::SeqCst);
        if remaining > 0 {
            inner.fail_connects.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *inner.inbound.lock().unwrap() = Some(tx);

        Ok((
            Box::new(FakeSink {
                server: self.server.clone(),
            }),
            Box::new(FakeStream { rx }),
        ))
    }
}

struct FakeSink {
    server: FakeServer,
}

#[async_trait]
impl FrameSink for FakeSink {
    async fn send(&mut self, message: WireMessage) -> Result<(), TransportError> {
        match message {
            WireMessage::Text(text) => {
                self.server.inner.sent.lock().unwrap().push(text);
            }
            WireMessage::Ping(payload) => {
                // A well-behaved server answers probes promptly.
                if let Some(tx) = self.server.inner.inbound.lock().unwrap().as_ref() {
                    let _ = tx.send(Ok(WireMessage::Pong(payload)));
                }
            }
            WireMessage::Pong(_) | WireMessage::Close => {}
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct FakeStream {
    rx: mpsc::UnboundedReceiver<Result<WireMessage, TransportError>>,
}

#[async_trait]
impl FrameStream for FakeStream {
    async fn next(&mut self) -> Option<Result<WireMessage, TransportError>> {
        self.rx.recv().await
    }
}

/// Poll `predicate` until it holds or `timeout` elapses.
pub async fn wait_for(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    predicate()
}
