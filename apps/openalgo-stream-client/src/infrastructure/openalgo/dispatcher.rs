//! Message Dispatcher
//!
//! Routes decoded frames to the latest-value caches and fans them out to
//! registered callbacks. Every callback invocation is individually fault
//! isolated: one failing subscriber never starves the others, and nothing
//! a subscriber does can terminate the read loop.

use std::sync::Arc;

use crate::domain::cache::TickCaches;
use crate::domain::market_data::{DepthTick, LtpTick, QuoteTick};
use crate::domain::subscription::{
    DepthUpdate, LtpUpdate, QuoteUpdate, SubscriptionKind, SubscriptionRegistry, SymbolKey,
    TickEvent,
};
use crate::infrastructure::metrics;
use crate::infrastructure::openalgo::codec::Decoded;
use crate::infrastructure::openalgo::messages::StreamFrame;

/// Routes inbound frames to caches and subscribers.
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    caches: Arc<TickCaches>,
}

impl Dispatcher {
    /// Create a dispatcher over the session's registry and caches.
    #[must_use]
    pub const fn new(registry: Arc<SubscriptionRegistry>, caches: Arc<TickCaches>) -> Self {
        Self { registry, caches }
    }

    /// Route one decoded frame.
    pub fn dispatch(&self, decoded: Decoded) {
        match decoded.frame {
            StreamFrame::Ltp(tick) => self.on_ltp(tick, decoded.raw),
            StreamFrame::Quote(quote) => self.on_quote(quote),
            StreamFrame::Depth(depth) => self.on_depth(depth),
            StreamFrame::Error(frame) => {
                tracing::error!(message = ?frame.message, "stream error frame");
            }
            StreamFrame::Subscribed(ack) => {
                tracing::debug!(fields = ?ack.fields, "subscription confirmed");
            }
            StreamFrame::Unsubscribed(ack) => {
                tracing::debug!(fields = ?ack.fields, "unsubscription confirmed");
            }
        }
    }

    fn on_ltp(&self, tick: LtpTick, raw: serde_json::Value) {
        let Some(key) = frame_key(&tick.exchange, &tick.symbol, SubscriptionKind::Ltp) else {
            return;
        };

        metrics::record_frame(SubscriptionKind::Ltp);
        self.caches.ltp.insert(key.clone(), tick.ltp);

        let event = TickEvent::Ltp(LtpUpdate {
            exchange: tick.exchange,
            symbol: tick.symbol,
            ltp: tick.ltp,
            frame: raw,
        });
        self.fan_out(SubscriptionKind::Ltp, &key, &event);
    }

    fn on_quote(&self, quote: QuoteTick) {
        let Some(key) = frame_key(&quote.exchange, &quote.symbol, SubscriptionKind::Quote) else {
            return;
        };

        metrics::record_frame(SubscriptionKind::Quote);

        // A quote carrying a price also refreshes the LTP cache, but LTP
        // subscribers are only notified by dedicated LTP frames.
        if let Some(ltp) = quote.ltp {
            self.caches.ltp.insert(key.clone(), ltp);
        }
        self.caches.quote.insert(key.clone(), quote.clone());

        let event = TickEvent::Quote(QuoteUpdate {
            exchange: quote.exchange.clone(),
            symbol: quote.symbol.clone(),
            quote,
        });
        self.fan_out(SubscriptionKind::Quote, &key, &event);
    }

    fn on_depth(&self, depth: DepthTick) {
        let Some(key) = frame_key(&depth.exchange, &depth.symbol, SubscriptionKind::Depth) else {
            return;
        };

        metrics::record_frame(SubscriptionKind::Depth);
        self.caches.depth.insert(key.clone(), depth.clone());

        let event = TickEvent::Depth(DepthUpdate {
            exchange: depth.exchange.clone(),
            symbol: depth.symbol.clone(),
            depth,
        });
        self.fan_out(SubscriptionKind::Depth, &key, &event);
    }

    /// Invoke every callback for `(kind, key)` in registration order.
    fn fan_out(&self, kind: SubscriptionKind, key: &SymbolKey, event: &TickEvent) {
        for cb in self.registry.callbacks(kind, key) {
            if let Err(error) = cb(event) {
                metrics::record_callback_error(kind);
                tracing::error!(%kind, %key, %error, "subscriber callback failed");
            }
        }
    }
}

/// Validate a frame's instrument identity.
fn frame_key(exchange: &str, symbol: &str, kind: SubscriptionKind) -> Option<SymbolKey> {
    match SymbolKey::new(exchange, symbol) {
        Ok(key) => Some(key),
        Err(error) => {
            tracing::warn!(%kind, %error, "dropping frame with invalid instrument identity");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::subscription::callback;
    use crate::infrastructure::openalgo::codec::JsonCodec;

    fn setup() -> (Arc<SubscriptionRegistry>, Arc<TickCaches>, Dispatcher) {
        let registry = Arc::new(SubscriptionRegistry::new());
        let caches = Arc::new(TickCaches::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&caches));
        (registry, caches, dispatcher)
    }

    fn key(exchange: &str, symbol: &str) -> SymbolKey {
        SymbolKey::new(exchange, symbol).unwrap()
    }

    fn decode(text: &str) -> Decoded {
        JsonCodec::new().decode(text).unwrap()
    }

    fn price(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn ltp_frame_updates_cache_and_notifies() {
        let (registry, caches, dispatcher) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        registry.add(
            SubscriptionKind::Ltp,
            key("NSE", "INFY"),
            callback(move |event| {
                if let TickEvent::Ltp(update) = event {
                    sink.lock().unwrap().push((
                        update.exchange.clone(),
                        update.symbol.clone(),
                        update.ltp,
                        update.frame.clone(),
                    ));
                }
                Ok(())
            }),
        );

        dispatcher.dispatch(decode(
            r#"{"type":"ltp","exchange":"NSE","symbol":"INFY","ltp":1500.5}"#,
        ));

        assert_eq!(caches.ltp.get(&key("NSE", "INFY")), Some(price("1500.5")));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (exchange, symbol, ltp, frame) = &seen[0];
        assert_eq!(exchange, "NSE");
        assert_eq!(symbol, "INFY");
        assert_eq!(*ltp, price("1500.5"));
        assert_eq!(frame["type"], "ltp");
    }

    #[test]
    fn quote_frame_refreshes_ltp_cache_without_notifying_ltp_subscribers() {
        let (registry, caches, dispatcher) = setup();
        let ltp_calls = Arc::new(AtomicUsize::new(0));
        let quote_calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&ltp_calls);
        registry.add(
            SubscriptionKind::Ltp,
            key("NSE", "INFY"),
            callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        let counter = Arc::clone(&quote_calls);
        registry.add(
            SubscriptionKind::Quote,
            key("NSE", "INFY"),
            callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        dispatcher.dispatch(decode(
            r#"{"type":"quote","exchange":"NSE","symbol":"INFY","ltp":1501.0,"open":1490.0}"#,
        ));

        assert_eq!(caches.ltp.get(&key("NSE", "INFY")), Some(price("1501")));
        assert!(caches.quote.get(&key("NSE", "INFY")).is_some());
        assert_eq!(ltp_calls.load(Ordering::SeqCst), 0);
        assert_eq!(quote_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn quote_without_price_leaves_ltp_cache_alone() {
        let (_registry, caches, dispatcher) = setup();

        dispatcher.dispatch(decode(
            r#"{"type":"quote","exchange":"NSE","symbol":"INFY","open":1490.0}"#,
        ));

        assert_eq!(caches.ltp.get(&key("NSE", "INFY")), None);
        assert!(caches.quote.get(&key("NSE", "INFY")).is_some());
    }

    #[test]
    fn depth_frame_updates_cache_and_notifies() {
        let (registry, caches, dispatcher) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        registry.add(
            SubscriptionKind::Depth,
            key("NSE", "INFY"),
            callback(move |event| {
                assert!(matches!(event, TickEvent::Depth(_)));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        dispatcher.dispatch(decode(
            r#"{"type":"depth","exchange":"NSE","symbol":"INFY",
                "bids":[{"price":1500.4,"quantity":120}],
                "asks":[{"price":1500.6,"quantity":80}]}"#,
        ));

        let cached = caches.depth.get(&key("NSE", "INFY")).unwrap();
        assert_eq!(cached.best_bid().unwrap().price, price("1500.4"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_callback_does_not_block_later_ones() {
        let (registry, _caches, dispatcher) = setup();
        let second_ran = Arc::new(AtomicUsize::new(0));

        registry.add(
            SubscriptionKind::Quote,
            key("NSE", "INFY"),
            callback(|_| Err("subscriber exploded".into())),
        );
        let counter = Arc::clone(&second_ran);
        registry.add(
            SubscriptionKind::Quote,
            key("NSE", "INFY"),
            callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        dispatcher.dispatch(decode(
            r#"{"type":"quote","exchange":"NSE","symbol":"INFY","ltp":1500.5}"#,
        ));

        assert_eq!(second_ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let (registry, _caches, dispatcher) = setup();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            registry.add(
                SubscriptionKind::Ltp,
                key("NSE", "INFY"),
                callback(move |_| {
                    order.lock().unwrap().push(label);
                    Ok(())
                }),
            );
        }

        dispatcher.dispatch(decode(
            r#"{"type":"ltp","exchange":"NSE","symbol":"INFY","ltp":1.0}"#,
        ));

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn frames_for_other_keys_do_not_notify() {
        let (registry, _caches, dispatcher) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        registry.add(
            SubscriptionKind::Ltp,
            key("NSE", "INFY"),
            callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        dispatcher.dispatch(decode(
            r#"{"type":"ltp","exchange":"NSE","symbol":"TCS","ltp":3200.0}"#,
        ));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn control_frames_have_no_cache_or_callback_effect() {
        let (registry, caches, dispatcher) = setup();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        registry.add(
            SubscriptionKind::Ltp,
            key("NSE", "INFY"),
            callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        dispatcher.dispatch(decode(r#"{"type":"error","message":"boom"}"#));
        dispatcher.dispatch(decode(r#"{"type":"subscribed","mode":"ltp"}"#));
        dispatcher.dispatch(decode(r#"{"type":"unsubscribed","mode":"ltp"}"#));

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(caches.ltp.is_empty());
    }

    #[test]
    fn frame_with_empty_identity_is_dropped() {
        let (_registry, caches, dispatcher) = setup();

        dispatcher.dispatch(decode(r#"{"type":"ltp","exchange":"","symbol":"INFY","ltp":1.0}"#));

        assert!(caches.ltp.is_empty());
    }
}
