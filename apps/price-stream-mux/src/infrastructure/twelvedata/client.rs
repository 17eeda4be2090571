//! Quote Stream WebSocket Client
//!
//! Owns the single persistent connection to the Twelve Data price stream
//! and drives its whole lifecycle: connect, recover subscriptions, decode
//! and forward events, reconnect with bounded backoff on unplanned close.
//!
//! # Lifecycle
//!
//! The `run` loop is sequential, so at most one live connection (or connect
//! attempt) exists at any time. On every successful open the client resets
//! the backoff policy and re-subscribes in bulk to every symbol currently
//! in the registry — the registry survives transport churn, the provider
//! session does not. Reconnection is driven solely by transport loss:
//! provider-reported `error` events are forwarded for classification but
//! never trigger a reconnect themselves, so a single failure is not counted
//! twice.
//!
//! Once the attempt budget is exhausted the client parks until it is either
//! cancelled or explicitly told to try again with [`Command::Reconnect`].

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::codec::JsonCodec;
use super::liveness::{LivenessConfig, LivenessState};
use super::messages::{
    ControlRequest, ErrorMessage, PriceMessage, ProviderMessage, SubscribeStatusMessage,
};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::domain::registry::{Symbol, SymbolRegistry};
use crate::infrastructure::config::Credentials;
use crate::infrastructure::metrics::{
    MessageKind, record_frame_dropped, record_message_received, record_reconnect,
};

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the quote stream client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection closed by the provider.
    #[error("connection closed")]
    ConnectionClosed,

    /// No inbound frames for longer than the staleness threshold.
    #[error("connection stale: no inbound frames")]
    StaleConnection,

    /// Command channel closed (the owning multiplexer is gone).
    #[error("command channel closed")]
    CommandChannelClosed,
}

// =============================================================================
// Events and Commands
// =============================================================================

/// Events emitted by the quote stream client.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Connection is open.
    Connected,
    /// Connection was lost.
    Disconnected,
    /// Reconnecting after an unplanned close.
    Reconnecting {
        /// Reconnection attempt number.
        attempt: u32,
    },
    /// Reconnection attempts are exhausted; no further automatic attempts.
    RetriesExhausted,
    /// A price update arrived.
    Price(PriceMessage),
    /// The provider acknowledged a subscription change.
    SubscribeStatus(SubscribeStatusMessage),
    /// The provider reported an error.
    ProviderError(ErrorMessage),
}

/// Commands sent to the client by the owning multiplexer.
#[derive(Debug, Clone)]
pub enum Command {
    /// Subscribe to symbols on the live connection.
    Subscribe(Vec<Symbol>),
    /// Unsubscribe a symbol on the live connection.
    Unsubscribe(Symbol),
    /// Force a fresh connection attempt after retries were exhausted.
    Reconnect,
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the quote stream client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Provider WebSocket URL (without credential).
    pub url: String,
    /// API credentials.
    pub credentials: Credentials,
    /// Reconnection configuration.
    pub reconnect: ReconnectConfig,
    /// Liveness configuration.
    pub liveness: LivenessConfig,
}

impl ClientConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(url: String, credentials: Credentials) -> Self {
        Self {
            url,
            credentials,
            reconnect: ReconnectConfig::default(),
            liveness: LivenessConfig::default(),
        }
    }

    /// Full endpoint with the static credential embedded as a query
    /// parameter.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}?apikey={}", self.url, self.credentials.api_key())
    }
}

// =============================================================================
// Quote Stream Client
// =============================================================================

/// WebSocket client for the provider price stream.
///
/// The registry is shared with the multiplexer; the client only ever reads
/// its symbol list, and only at connection-open time (the bulk re-subscribe
/// touchpoint).
pub struct QuoteStreamClient {
    config: ClientConfig,
    codec: JsonCodec,
    registry: Arc<RwLock<SymbolRegistry>>,
    event_tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl QuoteStreamClient {
    /// Create a new client.
    #[must_use]
    pub fn new(
        config: ClientConfig,
        registry: Arc<RwLock<SymbolRegistry>>,
        event_tx: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            codec: JsonCodec::new(),
            registry,
            event_tx,
            cancel,
        }
    }

    /// Run the connection loop until cancelled.
    pub async fn run(self: Arc<Self>, mut commands: mpsc::Receiver<Command>) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("quote stream client cancelled");
                return;
            }

            match self.connect_and_run(&mut commands, &mut policy).await {
                Ok(()) => {
                    tracing::info!("quote stream closed gracefully");
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "quote stream connection lost");
                    let _ = self.event_tx.send(StreamEvent::Disconnected).await;

                    if let Some(delay) = policy.next_delay() {
                        let attempt = policy.attempt_count();
                        record_reconnect();
                        tracing::info!(
                            attempt,
                            delay_ms = delay.as_millis(),
                            "reconnecting to quote stream"
                        );
                        let _ = self
                            .event_tx
                            .send(StreamEvent::Reconnecting { attempt })
                            .await;

                        tokio::select! {
                            () = self.cancel.cancelled() => {
                                tracing::info!("quote stream client cancelled during reconnect delay");
                                return;
                            }
                            () = tokio::time::sleep(delay) => {}
                        }
                    } else {
                        tracing::error!(
                            attempts = policy.attempt_count(),
                            "quote stream reconnect attempts exhausted"
                        );
                        let _ = self.event_tx.send(StreamEvent::RetriesExhausted).await;

                        if !self.await_manual_reconnect(&mut commands).await {
                            return;
                        }
                        policy.reset();
                    }
                }
            }
        }
    }

    /// Park until a caller forces a fresh attempt.
    ///
    /// Returns false when the client should shut down instead.
    async fn await_manual_reconnect(&self, commands: &mut mpsc::Receiver<Command>) -> bool {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return false,
                cmd = commands.recv() => match cmd {
                    Some(Command::Reconnect) => {
                        tracing::info!("manual reconnect requested");
                        return true;
                    }
                    // The registry already holds any subscription change;
                    // recovery covers it if we ever reopen.
                    Some(_) => {}
                    None => return false,
                },
            }
        }
    }

    /// Connect and process the stream until loss or cancellation.
    async fn connect_and_run(
        &self,
        commands: &mut mpsc::Receiver<Command>,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), ClientError> {
        tracing::info!(url = %self.config.url, "connecting to quote stream");
        let (ws_stream, _response) =
            tokio_tungstenite::connect_async(self.config.endpoint()).await?;
        let (mut write, mut read) = ws_stream.split();

        policy.reset();
        let _ = self.event_tx.send(StreamEvent::Connected).await;

        // Recovery path: the registry is the source of truth for what the
        // provider session should be streaming. Commands enqueued before
        // this snapshot are redundant with it and are dropped; holding the
        // registry lock across drain + snapshot keeps that atomic against
        // concurrent subscribes, so each symbol is subscribed exactly once.
        let symbols = {
            let registry = self.registry.read();
            while commands.try_recv().is_ok() {}
            registry.symbols()
        };
        if !symbols.is_empty() {
            self.send_control(&mut write, &ControlRequest::subscribe(&symbols))
                .await?;
        }

        let liveness = LivenessState::new();
        let mut liveness_check = tokio::time::interval(self.config.liveness.check_interval);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                _ = liveness_check.tick() => {
                    if liveness.is_stale(self.config.liveness.stale_after) {
                        tracing::warn!(
                            idle_secs = liveness.idle_for().as_secs(),
                            "quote stream went quiet"
                        );
                        return Err(ClientError::StaleConnection);
                    }
                }
                cmd = commands.recv() => match cmd {
                    Some(Command::Subscribe(symbols)) => {
                        self.send_control(&mut write, &ControlRequest::subscribe(&symbols))
                            .await?;
                    }
                    Some(Command::Unsubscribe(symbol)) => {
                        self.send_control(&mut write, &ControlRequest::unsubscribe(&symbol))
                            .await?;
                    }
                    // Already connected.
                    Some(Command::Reconnect) => {}
                    None => return Err(ClientError::CommandChannelClosed),
                },
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        liveness.record_frame();
                        self.handle_text_frame(&text).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        liveness.record_frame();
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        liveness.record_frame();
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("provider sent close frame");
                        return Err(ClientError::ConnectionClosed);
                    }
                    Some(Ok(_)) => {
                        // Ignore other frame types.
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        tracing::info!("quote stream ended");
                        return Err(ClientError::ConnectionClosed);
                    }
                },
            }
        }
    }

    /// Decode and forward a text frame.
    ///
    /// Malformed frames are logged and dropped; they never take down the
    /// connection or the dispatcher.
    async fn handle_text_frame(&self, text: &str) {
        match self.codec.decode(text) {
            Ok(ProviderMessage::Price(price)) => {
                record_message_received(MessageKind::Price);
                let _ = self.event_tx.send(StreamEvent::Price(price)).await;
            }
            Ok(ProviderMessage::Heartbeat(_)) => {
                // Liveness was already refreshed when the frame arrived.
                record_message_received(MessageKind::Heartbeat);
            }
            Ok(ProviderMessage::SubscribeStatus(status)) => {
                record_message_received(MessageKind::SubscribeStatus);
                let _ = self
                    .event_tx
                    .send(StreamEvent::SubscribeStatus(status))
                    .await;
            }
            Ok(ProviderMessage::Error(error)) => {
                record_message_received(MessageKind::Error);
                tracing::error!(code = error.code, msg = %error.message, "provider error");
                let _ = self.event_tx.send(StreamEvent::ProviderError(error)).await;
            }
            Err(e) => {
                record_frame_dropped("malformed");
                tracing::warn!(error = %e, "dropping malformed provider frame");
            }
        }
    }

    /// Send a control request on the live connection.
    async fn send_control<W>(
        &self,
        write: &mut W,
        request: &ControlRequest,
    ) -> Result<(), ClientError>
    where
        W: SinkExt<Message> + Unpin,
        W::Error: std::fmt::Display,
    {
        let json = self
            .codec
            .encode(request)
            .map_err(|e| ClientError::ConnectionFailed(format!("failed to serialize control: {e}")))?;

        tracing::debug!(
            action = ?request.action,
            symbols = %request.params.symbols,
            "sending control request"
        );

        write.send(Message::Text(json.into())).await.map_err(|e| {
            ClientError::ConnectionFailed(format!("failed to send control: {e}"))
        })?;

        Ok(())
    }
}
