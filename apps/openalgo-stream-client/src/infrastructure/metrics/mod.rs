//! Metrics Instrumentation
//!
//! Counters and gauges recorded through the `metrics` facade. A binary
//! that wants them exported installs a recorder of its choice; without one
//! the macros are no-ops, so library users pay nothing.
//!
//! # Metrics Categories
//!
//! - **Frames**: inbound frames routed or dropped, by kind
//! - **Subscriptions**: live key counts, by kind
//! - **Connection**: reconnection attempts, wire requests, callback errors

use metrics::{counter, describe_counter, describe_gauge, gauge};

use crate::domain::subscription::SubscriptionKind;
use crate::infrastructure::openalgo::messages::WireAction;

/// Register metric descriptions with the installed recorder.
///
/// Call once at startup, after installing a recorder.
pub fn register_metrics() {
    describe_counter!(
        "stream_client_frames_total",
        "Inbound data frames routed to caches and subscribers"
    );
    describe_counter!(
        "stream_client_frames_dropped_total",
        "Inbound frames dropped as malformed or unrecognized"
    );
    describe_counter!(
        "stream_client_callback_errors_total",
        "Subscriber callbacks that returned an error"
    );
    describe_counter!(
        "stream_client_reconnects_total",
        "Reconnection attempts after connection loss"
    );
    describe_counter!(
        "stream_client_wire_requests_total",
        "Subscribe/unsubscribe requests sent upstream"
    );
    describe_gauge!(
        "stream_client_subscriptions",
        "Live subscription keys, by kind"
    );
}

/// Record one routed data frame.
pub fn record_frame(kind: SubscriptionKind) {
    counter!("stream_client_frames_total", "kind" => kind.as_str()).increment(1);
}

/// Record one dropped frame.
pub fn record_frame_dropped() {
    counter!("stream_client_frames_dropped_total").increment(1);
}

/// Record one failed subscriber callback.
pub fn record_callback_error(kind: SubscriptionKind) {
    counter!("stream_client_callback_errors_total", "kind" => kind.as_str()).increment(1);
}

/// Record one reconnection attempt.
pub fn record_reconnect() {
    counter!("stream_client_reconnects_total").increment(1);
}

/// Record one outbound wire request.
pub fn record_wire_request(action: WireAction) {
    counter!("stream_client_wire_requests_total", "action" => action.as_str()).increment(1);
}

/// Update the live-key gauge for a kind.
pub fn set_subscription_count(kind: SubscriptionKind, count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("stream_client_subscriptions", "kind" => kind.as_str()).set(count as f64);
}
