//! Tracing Setup
//!
//! Structured logging via `tracing` with env-filter control.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: log filter (default: `price_stream_mux=info` plus quieter
//!   defaults for noisy HTTP internals)
//!
//! # Usage
//!
//! ```ignore
//! use price_stream_mux::infrastructure::telemetry;
//!
//! // Initialize once at startup.
//! telemetry::init();
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the global tracing subscriber.
///
/// Call once at startup; later calls would panic, so libraries must never
/// call this.
#[allow(clippy::expect_used)]
pub fn init() {
    let env_filter = EnvFilter::from_default_env()
        .add_directive(
            "price_stream_mux=info"
                .parse()
                .expect("static directive 'price_stream_mux=info' is valid"),
        )
        .add_directive(
            "tungstenite=warn"
                .parse()
                .expect("static directive 'tungstenite=warn' is valid"),
        )
        .add_directive(
            "hyper=warn"
                .parse()
                .expect("static directive 'hyper=warn' is valid"),
        );

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
