//! Price Stream Multiplexer Service
//!
//! The single service object consumers are handed: one provider connection,
//! shared by any number of independent subscribers that come and go without
//! affecting the connection's own lifetime.
//!
//! # Design
//!
//! The multiplexer is constructed explicitly with [`PriceStreamMux::start`]
//! and injected into consumers; there is no ambient global instance, so
//! lifetime and test isolation stay explicit. Internally it owns:
//!
//! - the symbol registry (source of truth for subscriptions),
//! - a command channel to the connection client for edge-triggered
//!   provider subscribe/unsubscribe traffic,
//! - the event-dispatch task that fans decoded prices out to callbacks and
//!   maintains the observable connection state.
//!
//! `subscribe` and `unsubscribe` are synchronous and never block: registry
//! mutation happens under a short lock, and any provider traffic is handed
//! off with a non-blocking `try_send`. Connection failures are never
//! surfaced to these calls; callers observe the `connected` watch and the
//! notice stream instead.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::domain::registry::{AddOutcome, PriceCallback, RemoveOutcome, SymbolRegistry};
use crate::infrastructure::config::MuxConfig;
use crate::infrastructure::metrics::{
    record_frame_dropped, record_prices_dispatched, set_connected, set_subscribed_symbols,
};
use crate::infrastructure::twelvedata::client::{
    ClientConfig, Command, QuoteStreamClient, StreamEvent,
};
use crate::infrastructure::twelvedata::liveness::LivenessConfig;
use crate::infrastructure::twelvedata::reconnect::ReconnectConfig;

// =============================================================================
// Observable State
// =============================================================================

/// Connection state of the price stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No credential configured; the stream never connects.
    Disabled,
    /// Initial connection attempt in progress.
    Connecting,
    /// Connection open.
    Connected,
    /// Connection lost.
    Disconnected,
    /// Backoff delay running before the next attempt.
    Reconnecting,
    /// Reconnect attempts exhausted; waiting for a manual retry.
    Halted,
}

impl ConnectionState {
    /// Stable string form for logs and the health endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Reconnecting => "reconnecting",
            Self::Halted => "halted",
        }
    }
}

/// One-shot, toast-level notifications surfaced to the hosting application.
///
/// None of these alter the reconnect loop; that loop is governed solely by
/// transport open/close events and the attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamNotice {
    /// The provider rejected the API key.
    Unauthorized,
    /// The provider reported a rate/credit limit.
    RateLimited,
    /// Any other provider-reported error.
    ProviderError {
        /// Provider error code.
        code: i32,
    },
    /// Automatic reconnection gave up; prices are stale until a manual
    /// retry succeeds.
    RetriesExhausted,
    /// The stream is disabled because no API key is configured.
    Disabled,
}

/// Registry statistics for observability surfaces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MuxStats {
    /// Number of distinct symbols with listeners.
    pub symbols: usize,
    /// Total registered callbacks.
    pub callbacks: usize,
}

/// Shared mutable status maintained by the event-dispatch task.
#[derive(Debug)]
struct StreamStatus {
    state: RwLock<ConnectionState>,
    reconnect_attempts: AtomicU32,
}

impl StreamStatus {
    fn new(initial: ConnectionState) -> Self {
        Self {
            state: RwLock::new(initial),
            reconnect_attempts: AtomicU32::new(0),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    fn record_attempt(&self, attempt: u32) {
        self.reconnect_attempts.store(attempt, Ordering::Relaxed);
    }

    fn reset_attempts(&self) {
        self.reconnect_attempts.store(0, Ordering::Relaxed);
    }

    fn attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Price Stream Multiplexer
// =============================================================================

/// One provider connection, many independent subscribers.
///
/// # Callback identity
///
/// `subscribe` and `unsubscribe` match callbacks by `Arc` identity. Retain
/// the `Arc` you subscribed with; a fresh closure wrapped in a new `Arc`
/// can never be unsubscribed.
pub struct PriceStreamMux {
    registry: Arc<RwLock<SymbolRegistry>>,
    command_tx: mpsc::Sender<Command>,
    connected_rx: watch::Receiver<bool>,
    notice_tx: broadcast::Sender<StreamNotice>,
    status: Arc<StreamStatus>,
    cancel: CancellationToken,
    enabled: bool,
}

impl PriceStreamMux {
    /// Start the multiplexer: spawn the connection client and the
    /// event-dispatch task.
    ///
    /// With placeholder credentials no connection is ever attempted; the
    /// stream reports itself disabled and `connected` stays false.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(config: &MuxConfig) -> Arc<Self> {
        let registry = Arc::new(RwLock::new(SymbolRegistry::new()));
        let (command_tx, command_rx) = mpsc::channel(config.stream.command_capacity);
        let (event_tx, event_rx) = mpsc::channel(config.stream.event_capacity);
        let (connected_tx, connected_rx) = watch::channel(false);
        let (notice_tx, _) = broadcast::channel(config.stream.notice_capacity);
        let cancel = CancellationToken::new();

        let enabled = !config.credentials.is_placeholder();
        let status = Arc::new(StreamStatus::new(if enabled {
            ConnectionState::Connecting
        } else {
            ConnectionState::Disabled
        }));

        if enabled {
            let client_config = ClientConfig {
                url: config.stream.url.clone(),
                credentials: config.credentials.clone(),
                reconnect: ReconnectConfig::from_stream_settings(&config.stream),
                liveness: LivenessConfig::from_stream_settings(&config.stream),
            };
            let client = Arc::new(QuoteStreamClient::new(
                client_config,
                Arc::clone(&registry),
                event_tx,
                cancel.clone(),
            ));
            tokio::spawn(client.run(command_rx));
            tokio::spawn(Self::drive_events(
                event_rx,
                Arc::clone(&registry),
                connected_tx,
                notice_tx.clone(),
                Arc::clone(&status),
            ));
        } else {
            tracing::warn!("price stream disabled: no API key configured");
            // Best-effort; the durable signals are `enabled()` and the
            // health endpoint.
            let _ = notice_tx.send(StreamNotice::Disabled);
        }

        Arc::new(Self {
            registry,
            command_tx,
            connected_rx,
            notice_tx,
            status,
            cancel,
            enabled,
        })
    }

    /// Register `callback` for price updates on `symbol`.
    ///
    /// Synchronous and infallible: invalid symbols and duplicate
    /// registrations are no-ops, and transport state never surfaces here.
    pub fn subscribe(&self, symbol: &str, callback: &PriceCallback) {
        // The edge-triggered command is sent under the registry lock so the
        // client's open-time snapshot (taken under the same lock) either
        // already contains the symbol or sees the command, never both.
        let symbol_count = {
            let mut registry = self.registry.write();
            let outcome = registry.add(symbol, callback);
            if let AddOutcome::FirstForSymbol(symbol) = outcome {
                // try_send keeps this call non-blocking; a full queue just
                // means the bulk re-subscribe at next open reconciles.
                let _ = self.command_tx.try_send(Command::Subscribe(vec![symbol]));
            }
            registry.symbol_count()
        };
        set_subscribed_symbols(symbol_count);
    }

    /// Remove `callback` from `symbol`.
    ///
    /// Unknown symbols and never-registered callbacks are safe no-ops.
    pub fn unsubscribe(&self, symbol: &str, callback: &PriceCallback) {
        let symbol_count = {
            let mut registry = self.registry.write();
            let outcome = registry.remove(symbol, callback);
            if let RemoveOutcome::LastForSymbol(symbol) = outcome {
                let _ = self.command_tx.try_send(Command::Unsubscribe(symbol));
            }
            registry.symbol_count()
        };
        set_subscribed_symbols(symbol_count);
    }

    /// Current connectivity snapshot.
    #[must_use]
    pub fn connected(&self) -> bool {
        *self.connected_rx.borrow()
    }

    /// Watch connectivity changes.
    #[must_use]
    pub fn watch_connected(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }

    /// Subscribe to one-shot notifications.
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<StreamNotice> {
        self.notice_tx.subscribe()
    }

    /// Whether a credential is configured and the stream may connect.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.status.state()
    }

    /// Reconnect attempts since the last successful open.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.status.attempts()
    }

    /// Registry statistics.
    #[must_use]
    pub fn stats(&self) -> MuxStats {
        let registry = self.registry.read();
        MuxStats {
            symbols: registry.symbol_count(),
            callbacks: registry.callback_count(),
        }
    }

    /// Force a fresh connection attempt after retries were exhausted.
    pub fn reconnect(&self) {
        if self.enabled {
            let _ = self.command_tx.try_send(Command::Reconnect);
        }
    }

    /// Tear the multiplexer down: cancel any pending reconnect, close the
    /// transport, stop the dispatch task. Idempotent.
    pub fn dispose(&self) {
        self.cancel.cancel();
    }

    /// Consume client events: maintain observable state, fan prices out to
    /// registered callbacks, map provider errors to notices.
    async fn drive_events(
        mut events: mpsc::Receiver<StreamEvent>,
        registry: Arc<RwLock<SymbolRegistry>>,
        connected_tx: watch::Sender<bool>,
        notice_tx: broadcast::Sender<StreamNotice>,
        status: Arc<StreamStatus>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                StreamEvent::Connected => {
                    status.set_state(ConnectionState::Connected);
                    status.reset_attempts();
                    let _ = connected_tx.send(true);
                    set_connected(true);
                    tracing::info!("price stream connected");
                }
                StreamEvent::Disconnected => {
                    status.set_state(ConnectionState::Disconnected);
                    let _ = connected_tx.send(false);
                    set_connected(false);
                }
                StreamEvent::Reconnecting { attempt } => {
                    status.set_state(ConnectionState::Reconnecting);
                    status.record_attempt(attempt);
                }
                StreamEvent::RetriesExhausted => {
                    status.set_state(ConnectionState::Halted);
                    let _ = notice_tx.send(StreamNotice::RetriesExhausted);
                }
                StreamEvent::Price(price) => {
                    // Snapshot under the lock, deliver outside it, so
                    // callbacks may re-enter subscribe/unsubscribe.
                    let listeners = registry.read().listeners(&price.symbol);
                    match listeners {
                        Some((symbol, callbacks)) => {
                            for callback in &callbacks {
                                callback(price.price, &symbol);
                            }
                            record_prices_dispatched(callbacks.len() as u64);
                        }
                        None => {
                            // Late frame for a symbol nobody watches anymore.
                            record_frame_dropped("no_subscribers");
                        }
                    }
                }
                StreamEvent::SubscribeStatus(ack) => {
                    if ack.is_ok() {
                        // The provider accepting a subscription doubles as
                        // confirmation that the session is live.
                        status.set_state(ConnectionState::Connected);
                        let _ = connected_tx.send(true);
                    } else {
                        let fails: Vec<&str> =
                            ack.fails.iter().map(|f| f.symbol.as_str()).collect();
                        tracing::warn!(?fails, "provider rejected subscription");
                    }
                }
                StreamEvent::ProviderError(error) => {
                    let notice = if error.is_auth_error() {
                        crate::infrastructure::metrics::record_provider_error("unauthorized");
                        StreamNotice::Unauthorized
                    } else if error.is_rate_limit_error() {
                        crate::infrastructure::metrics::record_provider_error("rate_limited");
                        StreamNotice::RateLimited
                    } else {
                        crate::infrastructure::metrics::record_provider_error("other");
                        StreamNotice::ProviderError { code: error.code }
                    };
                    let _ = notice_tx.send(notice);
                }
            }
        }

        // The client is gone (cancelled or dropped); whatever the last
        // state was, the stream is no longer live.
        let _ = connected_tx.send(false);
        set_connected(false);
    }
}

impl Drop for PriceStreamMux {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Tests
// =============================================================================
