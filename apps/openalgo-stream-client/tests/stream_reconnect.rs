//! Reconnection Integration Tests
//!
//! Connection-loss recovery against the in-process fake transport, on a
//! paused tokio clock so the 5-attempt / 5-second schedule is asserted
//! deterministically.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::time::Duration;

use serde_json::json;

use openalgo_stream_client::{
    ConnectionState, Credential, StreamClient, StreamSettings, SubscriptionKind, callback,
    channel_callback,
};
use support::{FakeServer, wait_for};

fn settings() -> StreamSettings {
    StreamSettings::new("ws://127.0.0.1:8765", Credential::new("test-key").unwrap()).unwrap()
}

async fn connected_client(server: &FakeServer) -> StreamClient {
    let client = StreamClient::with_connector(settings(), server.connector());
    assert!(client.connect().await);
    client
}

#[tokio::test(start_paused = true)]
async fn implicit_loss_resubscribes_every_key_exactly_once() {
    let server = FakeServer::new();
    let client = connected_client(&server).await;

    client
        .subscribe_ltp("NSE", "INFY", callback(|_| Ok(())))
        .await
        .unwrap();
    client
        .subscribe_quote("NSE", "INFY", callback(|_| Ok(())))
        .await
        .unwrap();
    client
        .subscribe_depth("BSE", "RELIANCE", callback(|_| Ok(())))
        .await
        .unwrap();

    assert!(wait_for(Duration::from_secs(1), || server.count_action("subscribe") == 3).await);
    server.clear_sent();

    server.drop_connection();

    // The registry survives the loss; after the reconnect every held key
    // is re-issued exactly once.
    assert!(wait_for(Duration::from_secs(30), || server.connect_attempts() == 2).await);
    assert!(wait_for(Duration::from_secs(5), || server.count_action("subscribe") == 3).await);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.count_requests("subscribe", "ltp", "NSE", "INFY"), 1);
    assert_eq!(server.count_requests("subscribe", "quote", "NSE", "INFY"), 1);
    assert_eq!(server.count_requests("subscribe", "depth", "BSE", "RELIANCE"), 1);

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.reconnect_attempts(), 0);
    assert_eq!(client.subscription_stats(SubscriptionKind::Ltp).key_count, 1);

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn reconnected_stream_dispatches_again_without_reregistration() {
    let server = FakeServer::new();
    let client = connected_client(&server).await;

    let (cb, mut rx) = channel_callback();
    client.subscribe_ltp("NSE", "INFY", cb).await.unwrap();

    server.drop_connection();
    assert!(wait_for(Duration::from_secs(30), || server.connect_attempts() == 2).await);

    server.send_json(&json!({
        "type": "ltp", "exchange": "NSE", "symbol": "INFY", "ltp": 42.0
    }));

    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("tick should arrive on the new connection")
        .expect("channel should stay open");
    assert_eq!(event.kind(), SubscriptionKind::Ltp);

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn reconnect_retries_through_failures_then_succeeds() {
    let server = FakeServer::new();
    let client = connected_client(&server).await;

    client
        .subscribe_ltp("NSE", "INFY", callback(|_| Ok(())))
        .await
        .unwrap();
    assert!(wait_for(Duration::from_secs(1), || server.count_action("subscribe") == 1).await);
    server.clear_sent();

    // Two attempts fail before the third lands.
    server.fail_next_connects(2);
    server.drop_connection();

    assert!(wait_for(Duration::from_secs(60), || server.connect_attempts() == 4).await);
    assert!(wait_for(Duration::from_secs(5), || server.count_action("subscribe") == 1).await);

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.reconnect_attempts(), 0);

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn reconnect_gives_up_after_exactly_five_spaced_attempts() {
    let server = FakeServer::new();
    let client = connected_client(&server).await;

    client
        .subscribe_ltp("NSE", "INFY", callback(|_| Ok(())))
        .await
        .unwrap();

    server.fail_next_connects(5);
    let outage_started = tokio::time::Instant::now();
    server.drop_connection();

    // Initial connect + 5 failed reconnects.
    assert!(wait_for(Duration::from_secs(60), || server.connect_attempts() == 6).await);

    // Attempts are spaced 5 seconds apart: 5 of them take 25 seconds.
    let elapsed = outage_started.elapsed();
    assert!(
        elapsed >= Duration::from_secs(25),
        "attempts finished too quickly: {elapsed:?}"
    );
    assert!(
        elapsed < Duration::from_secs(27),
        "attempts took too long: {elapsed:?}"
    );

    // Exhaustion is terminal: no sixth retry is ever scheduled.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(server.connect_attempts(), 6);
    assert!(wait_for(Duration::from_secs(1), || {
        client.state() == ConnectionState::Disconnected
    })
    .await);
    assert_eq!(client.reconnect_attempts(), 5);

    // The registry still holds the key; an explicit reconnect restores it.
    assert_eq!(client.subscription_stats(SubscriptionKind::Ltp).key_count, 1);
    server.clear_sent();
    assert!(client.connect().await);
    assert_eq!(client.state(), ConnectionState::Connected);

    client.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_an_outage_stops_the_retry_schedule() {
    let server = FakeServer::new();
    let client = connected_client(&server).await;

    client
        .subscribe_ltp("NSE", "INFY", callback(|_| Ok(())))
        .await
        .unwrap();

    server.fail_next_connects(5);
    server.drop_connection();

    assert!(wait_for(Duration::from_secs(10), || {
        client.state() == ConnectionState::Reconnecting
    })
    .await);

    client.disconnect().await;

    // The explicit path clears subscriptions and halts retries for good.
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(client.subscription_stats(SubscriptionKind::Ltp).key_count, 0);

    // Let any in-flight attempt settle before taking the baseline.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let attempts_at_disconnect = server.connect_attempts();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(server.connect_attempts(), attempts_at_disconnect);
}
