//! Price Stream Mux Binary
//!
//! Starts the price stream multiplexer as a standalone service: connects to
//! the provider, tails any symbols the operator asked to watch, and serves
//! health/metrics endpoints.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p price-stream-mux
//! ```
//!
//! # Environment Variables
//!
//! ## Credential
//! - `TWELVEDATA_API_KEY`: Twelve Data API key. Missing or `demo` disables
//!   the stream (the service still runs and reports the disabled state).
//!
//! ## Optional
//! - `WATCH_SYMBOLS`: Comma-separated symbols to log price updates for
//! - `PRICE_STREAM_URL`: Provider WebSocket URL
//! - `PRICE_STREAM_HEALTH_PORT`: Health check HTTP port (default: 8083)
//! - `PRICE_STREAM_RECONNECT_DELAY_INITIAL_MS`: First backoff delay (default: 1000)
//! - `PRICE_STREAM_RECONNECT_DELAY_MAX_SECS`: Backoff cap (default: 30)
//! - `PRICE_STREAM_RECONNECT_DELAY_MULTIPLIER`: Backoff multiplier (default: 2.0)
//! - `PRICE_STREAM_MAX_RECONNECT_ATTEMPTS`: Attempt cap, 0 = unlimited (default: 3)
//! - `PRICE_STREAM_STALE_AFTER_SECS`: Silence treated as a dead connection (default: 60)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use price_stream_mux::infrastructure::telemetry;
use price_stream_mux::{
    HealthServer, HealthServerState, MuxConfig, PriceCallback, PriceStreamMux, StreamNotice,
    init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    telemetry::init();

    tracing::info!("Starting Price Stream Mux");

    let _metrics_handle = init_metrics();

    let config = MuxConfig::from_env();
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let mux = PriceStreamMux::start(&config);

    // Tail whatever the operator asked to watch.
    let on_price: PriceCallback = Arc::new(|price, symbol| {
        tracing::info!(%symbol, %price, "price update");
    });
    for symbol in watch_symbols() {
        mux.subscribe(&symbol, &on_price);
    }

    // Surface one-shot notices in the logs.
    let mut notices = mux.notices();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(StreamNotice::Unauthorized) => {
                    tracing::error!("provider rejected the API key");
                }
                Ok(StreamNotice::RateLimited) => {
                    tracing::warn!("provider rate limit reached");
                }
                Ok(StreamNotice::ProviderError { code }) => {
                    tracing::warn!(code, "provider error");
                }
                Ok(StreamNotice::RetriesExhausted) => {
                    tracing::error!("price stream gave up reconnecting; prices are stale");
                }
                Ok(StreamNotice::Disabled) => {
                    tracing::warn!("price stream is disabled");
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notice stream lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Health server
    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&mux),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    tracing::info!("Price stream mux ready");

    await_shutdown().await;

    shutdown_token.cancel();
    mux.dispose();

    tracing::info!("Price stream mux stopped");
    Ok(())
}

/// Symbols the operator asked the binary to tail.
fn watch_symbols() -> Vec<String> {
    std::env::var("WATCH_SYMBOLS")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Log the parsed configuration.
fn log_config(config: &MuxConfig) {
    tracing::info!(
        url = %config.stream.url,
        enabled = !config.credentials.is_placeholder(),
        health_port = config.server.health_port,
        max_reconnect_attempts = config.stream.max_reconnect_attempts,
        "Configuration loaded"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
