//! Subscription Registry
//!
//! Domain types for tracking subscriber interest in streaming market data.
//!
//! # Design
//!
//! For each data kind the registry maps a [`SymbolKey`] to the ordered set
//! of callbacks registered for it. The live keys of each map exactly track
//! which instruments the remote server should currently be streaming:
//!
//! - the first callback for a key means an upstream wire subscribe is due,
//! - removing the last callback deletes the key and means a wire
//!   unsubscribe is due.
//!
//! The registry only *decides* those transitions; actually sending the wire
//! request is the connection layer's job.
//!
//! Callbacks are compared by `Arc` identity, so registering one clone of a
//! callback twice for the same key is a no-op.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use crate::domain::market_data::{DepthTick, QuoteTick};

// =============================================================================
// Symbol Key
// =============================================================================

/// Composite instrument identity: `exchange:symbol`.
///
/// Both parts must be non-empty; the constructor enforces this so that a
/// `SymbolKey` held anywhere in the client is always addressable on the
/// wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolKey {
    exchange: String,
    symbol: String,
}

impl SymbolKey {
    /// Create a key from its parts.
    ///
    /// # Errors
    ///
    /// Returns an error if either part is empty.
    pub fn new(
        exchange: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Result<Self, SymbolKeyError> {
        let exchange = exchange.into();
        let symbol = symbol.into();

        if exchange.is_empty() {
            return Err(SymbolKeyError::EmptyExchange);
        }
        if symbol.is_empty() {
            return Err(SymbolKeyError::EmptySymbol);
        }

        Ok(Self { exchange, symbol })
    }

    /// Exchange code.
    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Trading symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

impl FromStr for SymbolKey {
    type Err = SymbolKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (exchange, symbol) = s
            .split_once(':')
            .ok_or_else(|| SymbolKeyError::MissingSeparator(s.to_string()))?;
        Self::new(exchange, symbol)
    }
}

/// Validation errors for [`SymbolKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolKeyError {
    /// Exchange part is empty.
    #[error("exchange cannot be empty")]
    EmptyExchange,

    /// Symbol part is empty.
    #[error("symbol cannot be empty")]
    EmptySymbol,

    /// Parsed string is not of the form `exchange:symbol`.
    #[error("symbol key must be `exchange:symbol`, got `{0}`")]
    MissingSeparator(String),
}

// =============================================================================
// Subscription Kind
// =============================================================================

/// Category of streaming market data.
///
/// Each kind has its own independent registry and cache namespace; an
/// instrument may be subscribed under several kinds at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    /// Last traded price.
    Ltp,
    /// OHLC + volume quote.
    Quote,
    /// Order book depth.
    Depth,
}

impl SubscriptionKind {
    /// All kinds, in a fixed order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Ltp, Self::Quote, Self::Depth]
    }

    /// Wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ltp => "ltp",
            Self::Quote => "quote",
            Self::Depth => "depth",
        }
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionKind {
    type Err = UnknownKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ltp" => Ok(Self::Ltp),
            "quote" => Ok(Self::Quote),
            "depth" => Ok(Self::Depth),
            other => Err(UnknownKindError(other.to_string())),
        }
    }
}

/// Error for parsing a [`SubscriptionKind`] from its wire name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown subscription kind `{0}`")]
pub struct UnknownKindError(pub String);

// =============================================================================
// Tick Events and Callbacks
// =============================================================================

/// Error returned by a subscriber callback.
///
/// Callback failures are logged by the dispatcher and never propagate to
/// other callbacks or to the read loop.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Uniform subscriber callback contract.
///
/// Callbacks must return promptly; consumers that need to do async work
/// should bridge through a channel (see [`channel_callback`]). Callback
/// identity, used for idempotent registration and targeted removal, is the
/// `Arc` allocation: clone the same `Arc` to refer to the same callback.
pub type TickCallback = Arc<dyn Fn(&TickEvent) -> Result<(), CallbackError> + Send + Sync>;

/// Wrap a closure into a [`TickCallback`].
pub fn callback<F>(f: F) -> TickCallback
where
    F: Fn(&TickEvent) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Create a callback that forwards every event into an unbounded channel.
///
/// This is the bridge for async consumers: register the returned callback,
/// then `recv().await` owned [`TickEvent`]s from the receiver at whatever
/// pace suits the consumer.
#[must_use]
pub fn channel_callback() -> (TickCallback, mpsc::UnboundedReceiver<TickEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let cb = callback(move |event: &TickEvent| {
        tx.send(event.clone())
            .map_err(|_| CallbackError::from("tick event receiver dropped"))
    });
    (cb, rx)
}

/// A dispatched market data update.
#[derive(Debug, Clone)]
pub enum TickEvent {
    /// Last traded price update.
    Ltp(LtpUpdate),
    /// Quote update.
    Quote(QuoteUpdate),
    /// Depth update.
    Depth(DepthUpdate),
}

impl TickEvent {
    /// Kind of this event.
    #[must_use]
    pub const fn kind(&self) -> SubscriptionKind {
        match self {
            Self::Ltp(_) => SubscriptionKind::Ltp,
            Self::Quote(_) => SubscriptionKind::Quote,
            Self::Depth(_) => SubscriptionKind::Depth,
        }
    }

    /// Exchange code of the instrument this event concerns.
    #[must_use]
    pub fn exchange(&self) -> &str {
        match self {
            Self::Ltp(update) => &update.exchange,
            Self::Quote(update) => &update.exchange,
            Self::Depth(update) => &update.exchange,
        }
    }

    /// Trading symbol of the instrument this event concerns.
    #[must_use]
    pub fn symbol(&self) -> &str {
        match self {
            Self::Ltp(update) => &update.symbol,
            Self::Quote(update) => &update.symbol,
            Self::Depth(update) => &update.symbol,
        }
    }
}

/// Payload delivered to LTP subscribers.
#[derive(Debug, Clone)]
pub struct LtpUpdate {
    /// Exchange code.
    pub exchange: String,
    /// Trading symbol.
    pub symbol: String,
    /// Last traded price.
    pub ltp: Decimal,
    /// The raw frame as received, for subscribers that want vendor fields.
    pub frame: serde_json::Value,
}

/// Payload delivered to quote subscribers.
#[derive(Debug, Clone)]
pub struct QuoteUpdate {
    /// Exchange code.
    pub exchange: String,
    /// Trading symbol.
    pub symbol: String,
    /// The decoded quote.
    pub quote: QuoteTick,
}

/// Payload delivered to depth subscribers.
#[derive(Debug, Clone)]
pub struct DepthUpdate {
    /// Exchange code.
    pub exchange: String,
    /// Trading symbol.
    pub symbol: String,
    /// The decoded order book snapshot.
    pub depth: DepthTick,
}

// =============================================================================
// Registry State (per kind)
// =============================================================================

/// Callback sets for a single data kind.
#[derive(Default)]
struct KindSubscriptions {
    entries: HashMap<SymbolKey, Vec<TickCallback>>,
}

impl KindSubscriptions {
    /// Add a callback for a key.
    ///
    /// Returns `true` when the key newly appeared (wire subscribe due).
    fn add(&mut self, key: SymbolKey, cb: TickCallback) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let callbacks = occupied.get_mut();
                if !callbacks.iter().any(|existing| Arc::ptr_eq(existing, &cb)) {
                    callbacks.push(cb);
                }
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(vec![cb]);
                true
            }
        }
    }

    /// Remove one callback (or all, when `cb` is `None`) for a key.
    ///
    /// Returns `true` when the key was deleted (wire unsubscribe due).
    fn remove(&mut self, key: &SymbolKey, cb: Option<&TickCallback>) -> bool {
        let Some(callbacks) = self.entries.get_mut(key) else {
            return false;
        };

        match cb {
            Some(cb) => callbacks.retain(|existing| !Arc::ptr_eq(existing, cb)),
            None => callbacks.clear(),
        }

        if callbacks.is_empty() {
            self.entries.remove(key);
            true
        } else {
            false
        }
    }

    fn callbacks(&self, key: &SymbolKey) -> Vec<TickCallback> {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    fn keys(&self) -> Vec<SymbolKey> {
        self.entries.keys().cloned().collect()
    }

    fn key_count(&self) -> usize {
        self.entries.len()
    }

    fn callback_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Thread-safe registry of subscriber callbacks across all data kinds.
///
/// Invariant: a key present in a kind's map always has at least one
/// callback; the moment its callback set empties, the key is removed.
pub struct SubscriptionRegistry {
    ltp: RwLock<KindSubscriptions>,
    quote: RwLock<KindSubscriptions>,
    depth: RwLock<KindSubscriptions>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ltp: RwLock::new(KindSubscriptions::default()),
            quote: RwLock::new(KindSubscriptions::default()),
            depth: RwLock::new(KindSubscriptions::default()),
        }
    }

    /// Register a callback for `(kind, key)`.
    ///
    /// Registering a clone of an already-registered callback is a no-op.
    /// Returns `true` when the key newly appeared and a wire subscribe
    /// should be issued.
    pub fn add(&self, kind: SubscriptionKind, key: SymbolKey, cb: TickCallback) -> bool {
        self.state(kind).write().add(key, cb)
    }

    /// Remove a specific callback, or every callback when `cb` is `None`.
    ///
    /// Unknown keys are a trivial no-op. Returns `true` when the key was
    /// deleted and a wire unsubscribe should be issued.
    pub fn remove(&self, kind: SubscriptionKind, key: &SymbolKey, cb: Option<&TickCallback>) -> bool {
        self.state(kind).write().remove(key, cb)
    }

    /// Snapshot of the callbacks for `(kind, key)`, in registration order.
    #[must_use]
    pub fn callbacks(&self, kind: SubscriptionKind, key: &SymbolKey) -> Vec<TickCallback> {
        self.state(kind).read().callbacks(key)
    }

    /// Keys currently held for a kind.
    #[must_use]
    pub fn held_keys(&self, kind: SubscriptionKind) -> Vec<SymbolKey> {
        self.state(kind).read().keys()
    }

    /// Every `(kind, key)` currently held, across all kinds.
    ///
    /// This is the set a reconnect must re-issue wire subscribes for.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(SubscriptionKind, SymbolKey)> {
        let mut held = Vec::new();
        for kind in SubscriptionKind::all() {
            for key in self.held_keys(*kind) {
                held.push((*kind, key));
            }
        }
        held
    }

    /// Drop every subscription for every kind.
    ///
    /// Only the explicit-disconnect path calls this; an implicit connection
    /// loss must keep the registry intact for resubscription.
    pub fn clear_all(&self) {
        for kind in SubscriptionKind::all() {
            *self.state(*kind).write() = KindSubscriptions::default();
        }
    }

    /// Counters for a kind.
    #[must_use]
    pub fn stats(&self, kind: SubscriptionKind) -> RegistryStats {
        let state = self.state(kind).read();
        RegistryStats {
            key_count: state.key_count(),
            callback_count: state.callback_count(),
        }
    }

    const fn state(&self, kind: SubscriptionKind) -> &RwLock<KindSubscriptions> {
        match kind {
            SubscriptionKind::Ltp => &self.ltp,
            SubscriptionKind::Quote => &self.quote,
            SubscriptionKind::Depth => &self.depth,
        }
    }
}

/// Registry counters for a single kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of live keys.
    pub key_count: usize,
    /// Total registered callbacks across those keys.
    pub callback_count: usize,
}

// =============================================================================
// Tests
// =============================================================================
