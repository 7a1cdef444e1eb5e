//! Stream Client
//!
//! Connection manager and public facade for one streaming session. The
//! client owns a single multiplexed WebSocket connection, a subscription
//! registry, and the latest-value caches, and recovers from connection
//! loss with a bounded reconnection schedule.
//!
//! # Lifecycle
//!
//! A [`StreamClient`] is an explicitly constructed session handle (no
//! process-global state): build it with [`StreamClient::initialize`], hold
//! it wherever streaming data is needed (the handle is cheap to clone),
//! and end the session with [`StreamClient::shutdown`]. Exactly one
//! logical connection is meaningful per handle.
//!
//! # Registry teardown asymmetry
//!
//! Two distinct paths tear a connection down, deliberately with different
//! registry behavior:
//!
//! - [`StreamClient::disconnect`] is an explicit end of session: it stops
//!   the read loop, waits for it, and **clears all subscriptions**.
//! - An implicit connection loss **keeps the registry intact** so a
//!   successful reconnect can restore server-side streaming with
//!   [`resubscribe_all`](ClientInner::resubscribe_all), without callers
//!   re-registering anything.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{BoxedSink, BoxedStream, StreamConnector, WireMessage};
use crate::domain::cache::TickCaches;
use crate::domain::market_data::{DepthTick, QuoteTick};
use crate::domain::subscription::{
    RegistryStats, SubscriptionKind, SubscriptionRegistry, SymbolKey, SymbolKeyError, TickCallback,
};
use crate::infrastructure::config::StreamSettings;
use crate::infrastructure::metrics;
use crate::infrastructure::openalgo::codec::JsonCodec;
use crate::infrastructure::openalgo::dispatcher::Dispatcher;
use crate::infrastructure::openalgo::heartbeat::{
    HeartbeatConfig, HeartbeatEvent, HeartbeatManager, HeartbeatState,
};
use crate::infrastructure::openalgo::messages::SubscriptionRequest;
use crate::infrastructure::openalgo::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::infrastructure::openalgo::transport::WsConnector;

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of the streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection, none being attempted.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected and streaming.
    Connected,
    /// The connection was lost; bounded reconnection is running.
    Reconnecting,
    /// The session was explicitly shut down.
    Closed,
}

impl ConnectionState {
    /// Human-readable state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Errors returned by the client facade.
///
/// Connection problems are never surfaced here; they are logged and
/// reported through [`StreamClient::connect`]'s boolean result and the
/// connection state.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The exchange/symbol pair is not a valid instrument identity.
    #[error("invalid symbol key: {0}")]
    InvalidKey(#[from] SymbolKeyError),
}

// =============================================================================
// Stream Client
// =============================================================================

/// Handle to one streaming session.
///
/// Cloning is cheap and every clone drives the same session.
#[derive(Clone)]
pub struct StreamClient {
    inner: Arc<ClientInner>,
}

/// One live connection's moving parts.
struct ConnectionHandle {
    cancel: CancellationToken,
    wire_tx: mpsc::Sender<SubscriptionRequest>,
    reader: JoinHandle<()>,
}

struct ClientInner {
    settings: StreamSettings,
    connector: Arc<dyn StreamConnector>,
    registry: Arc<SubscriptionRegistry>,
    caches: Arc<TickCaches>,
    dispatcher: Dispatcher,
    state: parking_lot::RwLock<ConnectionState>,
    /// Whether the session wants a connection. Cleared by `disconnect`;
    /// gates the reconnect loop and late connection installs.
    should_run: AtomicBool,
    reconnect_attempts: AtomicU32,
    conn: tokio::sync::Mutex<Option<ConnectionHandle>>,
}

impl StreamClient {
    /// Create a client over the real WebSocket transport.
    ///
    /// The client starts disconnected; call [`connect`](Self::connect) or
    /// use [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(settings: StreamSettings) -> Self {
        Self::with_connector(settings, Arc::new(WsConnector::new()))
    }

    /// Create a client over a custom transport connector.
    ///
    /// Tests use this to stream against an in-process fake.
    #[must_use]
    pub fn with_connector(settings: StreamSettings, connector: Arc<dyn StreamConnector>) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let caches = Arc::new(TickCaches::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&caches));

        Self {
            inner: Arc::new(ClientInner {
                settings,
                connector,
                registry,
                caches,
                dispatcher,
                state: parking_lot::RwLock::new(ConnectionState::Disconnected),
                should_run: AtomicBool::new(false),
                reconnect_attempts: AtomicU32::new(0),
                conn: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Construct a session and connect it.
    ///
    /// An initial connection failure is logged, not fatal: the session
    /// handle is still returned and can be connected later. Callers
    /// replacing an existing session should [`shutdown`](Self::shutdown)
    /// the old handle first.
    pub async fn initialize(settings: StreamSettings) -> Self {
        let client = Self::new(settings);
        if !client.connect().await {
            tracing::warn!("initial connection failed; session starts disconnected");
        }
        client
    }

    /// Open the connection.
    ///
    /// A no-op returning `true` when already connected. Ordinary
    /// connection failures are logged and reported as `false`; nothing is
    /// raised.
    pub async fn connect(&self) -> bool {
        if self.state() == ConnectionState::Connected {
            return true;
        }

        self.inner.should_run.store(true, Ordering::SeqCst);
        *self.inner.state.write() = ConnectionState::Connecting;

        if open_connection(&self.inner).await {
            true
        } else {
            *self.inner.state.write() = ConnectionState::Disconnected;
            false
        }
    }

    /// Gracefully end the session.
    ///
    /// Stops the read loop and waits for it to terminate before returning,
    /// so no callback fires for frames received afterwards. Clears all
    /// subscription state for every kind. Idempotent.
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        inner.should_run.store(false, Ordering::SeqCst);

        let handle = inner.conn.lock().await.take();
        if let Some(handle) = handle {
            handle.cancel.cancel();
            if let Err(error) = handle.reader.await {
                tracing::warn!(%error, "read loop task ended abnormally");
            }
        }

        *inner.state.write() = ConnectionState::Closed;
        inner.registry.clear_all();
        for kind in SubscriptionKind::all() {
            metrics::set_subscription_count(*kind, 0);
        }
        tracing::info!("stream disconnected");
    }

    /// End the session. Alias for [`disconnect`](Self::disconnect),
    /// matching the init/shutdown lifecycle pairing.
    pub async fn shutdown(&self) {
        self.disconnect().await;
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// Reconnection attempts consumed in the current outage (0 after a
    /// successful connect).
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Registry counters for a kind.
    #[must_use]
    pub fn subscription_stats(&self, kind: SubscriptionKind) -> RegistryStats {
        self.inner.registry.stats(kind)
    }

    // =========================================================================
    // Public API - LTP
    // =========================================================================

    /// Subscribe to last-traded-price updates for an instrument.
    ///
    /// The first callback for an instrument triggers a wire subscribe when
    /// connected; registering a clone of an already-registered callback is
    /// a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error only for an invalid exchange/symbol pair.
    pub async fn subscribe_ltp(
        &self,
        exchange: &str,
        symbol: &str,
        cb: TickCallback,
    ) -> Result<(), ClientError> {
        self.subscribe(SubscriptionKind::Ltp, exchange, symbol, cb).await
    }

    /// Unsubscribe from LTP updates.
    ///
    /// Removes one specific callback, or every callback when `cb` is
    /// `None`. Removing the last callback triggers a wire unsubscribe when
    /// connected.
    ///
    /// # Errors
    ///
    /// Returns an error only for an invalid exchange/symbol pair.
    pub async fn unsubscribe_ltp(
        &self,
        exchange: &str,
        symbol: &str,
        cb: Option<&TickCallback>,
    ) -> Result<(), ClientError> {
        self.unsubscribe(SubscriptionKind::Ltp, exchange, symbol, cb).await
    }

    /// Latest cached LTP for an instrument.
    #[must_use]
    pub fn get_ltp(&self, exchange: &str, symbol: &str) -> Option<Decimal> {
        let key = SymbolKey::new(exchange, symbol).ok()?;
        self.inner.caches.ltp.get(&key)
    }

    // =========================================================================
    // Public API - Quote
    // =========================================================================

    /// Subscribe to quote updates (OHLC + volume) for an instrument.
    ///
    /// # Errors
    ///
    /// Returns an error only for an invalid exchange/symbol pair.
    pub async fn subscribe_quote(
        &self,
        exchange: &str,
        symbol: &str,
        cb: TickCallback,
    ) -> Result<(), ClientError> {
        self.subscribe(SubscriptionKind::Quote, exchange, symbol, cb).await
    }

    /// Unsubscribe from quote updates.
    ///
    /// # Errors
    ///
    /// Returns an error only for an invalid exchange/symbol pair.
    pub async fn unsubscribe_quote(
        &self,
        exchange: &str,
        symbol: &str,
        cb: Option<&TickCallback>,
    ) -> Result<(), ClientError> {
        self.unsubscribe(SubscriptionKind::Quote, exchange, symbol, cb).await
    }

    /// Latest cached quote for an instrument.
    #[must_use]
    pub fn get_quote(&self, exchange: &str, symbol: &str) -> Option<QuoteTick> {
        let key = SymbolKey::new(exchange, symbol).ok()?;
        self.inner.caches.quote.get(&key)
    }

    // =========================================================================
    // Public API - Depth
    // =========================================================================

    /// Subscribe to order book depth updates for an instrument.
    ///
    /// # Errors
    ///
    /// Returns an error only for an invalid exchange/symbol pair.
    pub async fn subscribe_depth(
        &self,
        exchange: &str,
        symbol: &str,
        cb: TickCallback,
    ) -> Result<(), ClientError> {
        self.subscribe(SubscriptionKind::Depth, exchange, symbol, cb).await
    }

    /// Unsubscribe from depth updates.
    ///
    /// # Errors
    ///
    /// Returns an error only for an invalid exchange/symbol pair.
    pub async fn unsubscribe_depth(
        &self,
        exchange: &str,
        symbol: &str,
        cb: Option<&TickCallback>,
    ) -> Result<(), ClientError> {
        self.unsubscribe(SubscriptionKind::Depth, exchange, symbol, cb).await
    }

    /// Latest cached order book snapshot for an instrument.
    #[must_use]
    pub fn get_depth(&self, exchange: &str, symbol: &str) -> Option<DepthTick> {
        let key = SymbolKey::new(exchange, symbol).ok()?;
        self.inner.caches.depth.get(&key)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn subscribe(
        &self,
        kind: SubscriptionKind,
        exchange: &str,
        symbol: &str,
        cb: TickCallback,
    ) -> Result<(), ClientError> {
        let key = SymbolKey::new(exchange, symbol)?;

        let first_subscriber = self.inner.registry.add(kind, key.clone(), cb);
        metrics::set_subscription_count(kind, self.inner.registry.stats(kind).key_count);

        if first_subscriber && self.state() == ConnectionState::Connected {
            self.inner
                .queue_wire(SubscriptionRequest::subscribe(kind, &key))
                .await;
        }

        Ok(())
    }

    async fn unsubscribe(
        &self,
        kind: SubscriptionKind,
        exchange: &str,
        symbol: &str,
        cb: Option<&TickCallback>,
    ) -> Result<(), ClientError> {
        let key = SymbolKey::new(exchange, symbol)?;

        let last_subscriber = self.inner.registry.remove(kind, &key, cb);
        metrics::set_subscription_count(kind, self.inner.registry.stats(kind).key_count);

        if last_subscriber && self.state() == ConnectionState::Connected {
            self.inner
                .queue_wire(SubscriptionRequest::unsubscribe(kind, &key))
                .await;
        }

        Ok(())
    }
}

impl ClientInner {
    /// Queue a wire request for the read loop to send.
    ///
    /// A failure is logged and the local registry state deliberately
    /// stands; the next reconnect resynchronizes the server side.
    async fn queue_wire(&self, request: SubscriptionRequest) {
        metrics::record_wire_request(request.action);

        let tx = self
            .conn
            .lock()
            .await
            .as_ref()
            .map(|conn| conn.wire_tx.clone());

        match tx {
            Some(tx) => {
                if let Err(error) = tx.send(request).await {
                    tracing::error!(%error, "failed to queue wire request; local subscription state is kept");
                }
            }
            None => tracing::debug!("no live connection; wire request skipped"),
        }
    }

    /// Re-issue one wire subscribe per held `(kind, key)`.
    ///
    /// Called exactly once per successful reconnect; callers never need to
    /// re-register callbacks.
    async fn resubscribe_all(&self) {
        let held = self.registry.snapshot();
        tracing::info!(
            subscriptions = held.len(),
            "restoring subscriptions after reconnect"
        );
        for (kind, key) in held {
            self.queue_wire(SubscriptionRequest::subscribe(kind, &key)).await;
        }
    }
}

/// Open the transport and start the read loop.
///
/// Returns `false` on failure; the caller decides what state that leaves
/// the session in.
async fn open_connection(inner: &Arc<ClientInner>) -> bool {
    tracing::info!(url = %inner.settings.ws_url, "connecting to stream server");

    let (sink, stream) = match inner.connector.connect(&inner.settings.ws_url).await {
        Ok(pair) => pair,
        Err(error) => {
            tracing::error!(%error, "stream connection failed");
            return false;
        }
    };

    let mut conn = inner.conn.lock().await;
    if !inner.should_run.load(Ordering::SeqCst) {
        // disconnect() won the race while the dial was in flight.
        let mut sink = sink;
        let _ = sink.close().await;
        return false;
    }

    let cancel = CancellationToken::new();
    let (wire_tx, wire_rx) = mpsc::channel(inner.settings.channels.wire_capacity);
    let reader = tokio::spawn(read_loop(
        Arc::clone(inner),
        sink,
        stream,
        wire_rx,
        cancel.clone(),
    ));

    *conn = Some(ConnectionHandle {
        cancel,
        wire_tx,
        reader,
    });
    *inner.state.write() = ConnectionState::Connected;
    inner.reconnect_attempts.store(0, Ordering::SeqCst);
    tracing::info!("stream connected");
    true
}

// =============================================================================
// Read Loop
// =============================================================================

enum ReadLoopExit {
    Cancelled,
    TransportClosed,
}

/// Process one connection until cancellation or transport loss.
async fn read_loop(
    inner: Arc<ClientInner>,
    mut sink: BoxedSink,
    mut stream: BoxedStream,
    mut wire_rx: mpsc::Receiver<SubscriptionRequest>,
    cancel: CancellationToken,
) {
    let codec = JsonCodec::new();

    let heartbeat_state = Arc::new(HeartbeatState::new());
    let (heartbeat_tx, mut heartbeat_rx) = mpsc::channel::<HeartbeatEvent>(8);
    let heartbeat_cancel = cancel.child_token();
    let heartbeat = HeartbeatManager::new(
        HeartbeatConfig::from_settings(&inner.settings.websocket),
        Arc::clone(&heartbeat_state),
        heartbeat_tx,
        heartbeat_cancel.clone(),
    );
    tokio::spawn(heartbeat.run());

    let exit = loop {
        tokio::select! {
            () = cancel.cancelled() => break ReadLoopExit::Cancelled,
            event = heartbeat_rx.recv() => match event {
                Some(HeartbeatEvent::SendPing) => {
                    heartbeat_state.mark_ping_sent();
                    if let Err(error) = sink.send(WireMessage::Ping(Vec::new())).await {
                        tracing::warn!(%error, "keep-alive ping failed");
                        break ReadLoopExit::TransportClosed;
                    }
                }
                Some(HeartbeatEvent::Timeout) => {
                    tracing::warn!("keep-alive probe timed out; dropping connection");
                    break ReadLoopExit::TransportClosed;
                }
                None => {}
            },
            request = wire_rx.recv() => {
                if let Some(request) = request {
                    send_request(&mut sink, &request).await;
                }
            }
            message = stream.next() => match message {
                Some(Ok(WireMessage::Text(text))) => {
                    heartbeat_state.record_activity();
                    match codec.decode(&text) {
                        Ok(decoded) => inner.dispatcher.dispatch(decoded),
                        Err(error) => {
                            // A malformed frame never terminates the stream.
                            metrics::record_frame_dropped();
                            tracing::warn!(%error, "dropping undecodable frame");
                        }
                    }
                }
                Some(Ok(WireMessage::Ping(payload))) => {
                    heartbeat_state.record_activity();
                    if let Err(error) = sink.send(WireMessage::Pong(payload)).await {
                        tracing::warn!(%error, "pong reply failed");
                        break ReadLoopExit::TransportClosed;
                    }
                }
                Some(Ok(WireMessage::Pong(_))) => heartbeat_state.record_activity(),
                Some(Ok(WireMessage::Close)) => {
                    tracing::info!("server closed the stream");
                    break ReadLoopExit::TransportClosed;
                }
                Some(Err(error)) => {
                    tracing::warn!(%error, "stream transport error");
                    break ReadLoopExit::TransportClosed;
                }
                None => {
                    tracing::info!("stream ended");
                    break ReadLoopExit::TransportClosed;
                }
            }
        }
    };

    heartbeat_cancel.cancel();

    match exit {
        ReadLoopExit::Cancelled => {
            let _ = sink.close().await;
        }
        ReadLoopExit::TransportClosed => {
            if inner.should_run.load(Ordering::SeqCst) {
                // Implicit loss: keep the registry for resubscription.
                *inner.state.write() = ConnectionState::Reconnecting;
                tracing::warn!("stream connection lost; scheduling reconnection");
                tokio::spawn(reconnect(Arc::clone(&inner), cancel.clone()));
            } else {
                *inner.state.write() = ConnectionState::Disconnected;
            }
        }
    }
}

/// Serialize and send one wire request.
async fn send_request(sink: &mut BoxedSink, request: &SubscriptionRequest) {
    match request.to_json() {
        Ok(json) => {
            tracing::debug!(
                action = request.action.as_str(),
                kind = %request.kind,
                "sending wire request"
            );
            if let Err(error) = sink.send(WireMessage::Text(json)).await {
                // Local registry state intentionally stands; the next
                // reconnect resynchronizes the server side.
                tracing::error!(%error, "wire request send failed");
            }
        }
        Err(error) => tracing::error!(%error, "wire request serialization failed"),
    }
}

// =============================================================================
// Reconnection
// =============================================================================

/// Bounded reconnection after an implicit connection loss.
///
/// Runs until the session reconnects, the schedule is exhausted, or the
/// session is shut down. Never runs concurrently with itself: only the
/// read loop that observed the loss spawns it, once.
async fn reconnect(inner: Arc<ClientInner>, cancel: CancellationToken) {
    let mut policy = ReconnectPolicy::new(ReconnectConfig::from_settings(&inner.settings.websocket));

    while inner.should_run.load(Ordering::SeqCst) {
        let Some(delay) = policy.next_delay() else {
            tracing::error!(
                attempts = policy.attempt_count(),
                "reconnection attempts exhausted; session stays offline until explicitly reconnected"
            );
            *inner.state.write() = ConnectionState::Disconnected;
            return;
        };

        let attempt = policy.attempt_count();
        inner.reconnect_attempts.store(attempt, Ordering::SeqCst);
        metrics::record_reconnect();
        tracing::info!(
            attempt,
            max_attempts = inner.settings.websocket.max_reconnect_attempts,
            delay_ms = delay.as_millis(),
            "reconnecting to stream server"
        );

        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("reconnect cancelled");
                return;
            }
            () = tokio::time::sleep(delay) => {}
        }

        if !inner.should_run.load(Ordering::SeqCst) {
            return;
        }

        // Someone reconnected explicitly while this schedule was sleeping.
        if *inner.state.read() == ConnectionState::Connected {
            return;
        }

        if open_connection(&inner).await {
            inner.resubscribe_all().await;
            return;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
