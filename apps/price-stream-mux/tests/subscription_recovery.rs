//! Subscription Recovery Integration Tests
//!
//! Exercises reconnection with bounded backoff and registry-driven
//! re-subscription after transport loss.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::collections::BTreeSet;
use std::time::Duration;

use price_stream_mux::{ConnectionState, PriceStreamMux, StreamNotice};

use common::{
    FakeProvider, await_connected, await_disconnected, counting_callback, test_config, wait_until,
};

// =============================================================================
// Recovery on Reconnect
// =============================================================================

#[tokio::test]
async fn registry_is_resubscribed_in_one_bulk_message_after_reconnect() {
    let mut provider = FakeProvider::spawn().await;
    let mux = PriceStreamMux::start(&test_config(provider.url()));
    let (cb1, _) = counting_callback();
    let (cb2, _) = counting_callback();

    await_connected(&mux).await;

    mux.subscribe("AAPL", &cb1);
    mux.subscribe("MSFT", &cb2);
    let _ = provider.next_control(Duration::from_secs(2)).await.unwrap();
    let _ = provider.next_control(Duration::from_secs(2)).await.unwrap();

    // Force an unplanned close; the registry must survive it.
    provider.kick();
    await_disconnected(&mux).await;
    await_connected(&mux).await;

    // Exactly one bulk subscribe listing both symbols, order-insensitive,
    // and no per-symbol duplicates afterwards.
    let control = provider.next_control(Duration::from_secs(2)).await.unwrap();
    assert_eq!(control["action"], "subscribe");
    let symbols: BTreeSet<&str> = control["params"]["symbols"]
        .as_str()
        .unwrap()
        .split(',')
        .collect();
    assert_eq!(symbols, BTreeSet::from(["AAPL", "MSFT"]));
    provider.expect_no_control(Duration::from_millis(200)).await;

    assert_eq!(provider.connection_count(), 2);

    mux.dispose();
}

#[tokio::test]
async fn connected_watch_tracks_loss_and_recovery() {
    let provider = FakeProvider::spawn().await;
    let mux = PriceStreamMux::start(&test_config(provider.url()));

    await_connected(&mux).await;
    assert!(mux.connected());

    provider.kick();
    await_disconnected(&mux).await;

    // Backoff runs, then the stream comes back on its own.
    await_connected(&mux).await;
    assert_eq!(mux.state(), ConnectionState::Connected);

    mux.dispose();
}

#[tokio::test]
async fn empty_registry_reconnects_without_control_traffic() {
    let mut provider = FakeProvider::spawn().await;
    let mux = PriceStreamMux::start(&test_config(provider.url()));

    await_connected(&mux).await;

    provider.kick();
    await_disconnected(&mux).await;
    await_connected(&mux).await;

    // Nothing registered, nothing to restore.
    provider.expect_no_control(Duration::from_millis(200)).await;

    mux.dispose();
}

// =============================================================================
// Attempt Cap
// =============================================================================

#[tokio::test]
async fn reconnect_gives_up_after_max_attempts() {
    let provider = FakeProvider::spawn().await;
    provider.set_healthy(false);

    let mut config = test_config(provider.url());
    config.stream.max_reconnect_attempts = 2;

    let mux = PriceStreamMux::start(&config);
    let mut notices = mux.notices();

    // Initial attempt plus two retries, then nothing.
    wait_until(|| provider.connection_count() == 3, Duration::from_secs(2)).await;

    let notice = tokio::time::timeout(Duration::from_secs(2), notices.recv())
        .await
        .expect("timed out waiting for notice")
        .unwrap();
    assert_eq!(notice, StreamNotice::RetriesExhausted);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(provider.connection_count(), 3);
    assert!(!mux.connected());
    assert_eq!(mux.state(), ConnectionState::Halted);

    mux.dispose();
}

#[tokio::test]
async fn manual_reconnect_revives_a_halted_stream() {
    let provider = FakeProvider::spawn().await;
    provider.set_healthy(false);

    let mut config = test_config(provider.url());
    config.stream.max_reconnect_attempts = 1;

    let mux = PriceStreamMux::start(&config);
    let mut notices = mux.notices();

    let notice = tokio::time::timeout(Duration::from_secs(2), notices.recv())
        .await
        .expect("timed out waiting for notice")
        .unwrap();
    assert_eq!(notice, StreamNotice::RetriesExhausted);
    assert_eq!(provider.connection_count(), 2);

    // A caller forcing a fresh attempt resets the backoff budget.
    provider.set_healthy(true);
    mux.reconnect();

    await_connected(&mux).await;
    assert_eq!(provider.connection_count(), 3);

    mux.dispose();
}

// =============================================================================
// Disposal
// =============================================================================

#[tokio::test]
async fn dispose_cancels_a_pending_reconnect() {
    let provider = FakeProvider::spawn().await;

    let mut config = test_config(provider.url());
    config.stream.reconnect_delay_initial = Duration::from_millis(300);

    let mux = PriceStreamMux::start(&config);
    await_connected(&mux).await;
    assert_eq!(provider.connection_count(), 1);

    // Lose the connection, then dispose while the backoff timer is pending.
    provider.kick();
    await_disconnected(&mux).await;
    mux.dispose();

    // The timer must never fire a reconnect after teardown.
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(provider.connection_count(), 1);
    assert!(!mux.connected());
}

#[tokio::test]
async fn dispose_while_connected_closes_cleanly() {
    let provider = FakeProvider::spawn().await;
    let mux = PriceStreamMux::start(&test_config(provider.url()));

    await_connected(&mux).await;
    mux.dispose();

    wait_until(|| !mux.connected(), Duration::from_secs(2)).await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(provider.connection_count(), 1);
}
