//! Prometheus Metrics Module
//!
//! Exposes multiplexer metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Messages**: counts of provider frames received by kind
//! - **Dispatch**: price deliveries and dropped frames
//! - **Connection**: connected gauge and reconnect attempts
//! - **Subscriptions**: active symbol count
//!
//! # Integration
//!
//! Metrics are rendered at `/metrics` on the health server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let builder = PrometheusBuilder::new();
            let handle = builder
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "price_stream_messages_received_total",
        "Total frames received from the provider by kind"
    );
    describe_counter!(
        "price_stream_prices_dispatched_total",
        "Total price deliveries to registered callbacks"
    );
    describe_counter!(
        "price_stream_frames_dropped_total",
        "Total frames dropped, by reason"
    );
    describe_counter!(
        "price_stream_reconnects_total",
        "Total reconnection attempts"
    );
    describe_counter!(
        "price_stream_provider_errors_total",
        "Total provider-reported errors by class"
    );

    describe_gauge!(
        "price_stream_connected",
        "Whether the provider connection is currently open (0/1)"
    );
    describe_gauge!(
        "price_stream_subscribed_symbols",
        "Number of symbols with at least one registered callback"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for provider frame kinds.
#[derive(Debug, Clone, Copy)]
pub enum MessageKind {
    /// Price update.
    Price,
    /// Heartbeat.
    Heartbeat,
    /// Subscription acknowledgement.
    SubscribeStatus,
    /// Provider-reported error.
    Error,
}

impl MessageKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Heartbeat => "heartbeat",
            Self::SubscribeStatus => "subscribe_status",
            Self::Error => "error",
        }
    }
}

/// Record a frame received from the provider.
pub fn record_message_received(kind: MessageKind) {
    counter!(
        "price_stream_messages_received_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record price deliveries to callbacks.
pub fn record_prices_dispatched(count: u64) {
    counter!("price_stream_prices_dispatched_total").increment(count);
}

/// Record a dropped frame.
pub fn record_frame_dropped(reason: &'static str) {
    counter!(
        "price_stream_frames_dropped_total",
        "reason" => reason
    )
    .increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("price_stream_reconnects_total").increment(1);
}

/// Record a provider-reported error.
pub fn record_provider_error(class: &'static str) {
    counter!(
        "price_stream_provider_errors_total",
        "class" => class
    )
    .increment(1);
}

/// Update the connected gauge.
pub fn set_connected(connected: bool) {
    gauge!("price_stream_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Update the subscribed-symbol gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribed_symbols(count: usize) {
    gauge!("price_stream_subscribed_symbols").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================
