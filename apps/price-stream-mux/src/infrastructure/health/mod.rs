//! Health Check and Metrics Endpoint
//!
//! HTTP endpoint for health checks, stream status reporting, and Prometheus
//! metrics. This is the surface dependent UIs and orchestrators use to tell
//! "live prices" apart from "stale prices": the stream's connectivity state
//! is always observable here, even when the feature is disabled.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (ready iff stream connected)
//! - `GET /metrics` - Prometheus metrics in text format

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::services::{ConnectionState, PriceStreamMux};
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy", "degraded", or "unhealthy".
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Price stream status.
    pub stream: StreamInfo,
    /// Subscription statistics.
    pub subscriptions: SubscriptionInfo,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Stream connected, prices are live.
    Healthy,
    /// Stream intentionally disabled; the service itself is fine.
    Degraded,
    /// Stream enabled but not connected; prices are stale.
    Unhealthy,
}

/// Price stream status.
#[derive(Debug, Clone, Serialize)]
pub struct StreamInfo {
    /// Connection state.
    pub state: String,
    /// Whether the stream is connected.
    pub connected: bool,
    /// Whether a credential is configured at all.
    pub enabled: bool,
    /// Reconnect attempts since the last successful open.
    pub reconnect_attempts: u32,
}

/// Subscription statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionInfo {
    /// Symbols with at least one listener.
    pub symbols: usize,
    /// Total registered callbacks.
    pub callbacks: usize,
}

// =============================================================================
// Health Server State
// =============================================================================

/// Shared state for the health server.
pub struct HealthServerState {
    version: String,
    started_at: Instant,
    mux: Arc<PriceStreamMux>,
}

impl HealthServerState {
    /// Create new health server state.
    #[must_use]
    pub fn new(version: String, mux: Arc<PriceStreamMux>) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            mux,
        }
    }
}

// =============================================================================
// Health Server
// =============================================================================

/// Health check HTTP server.
pub struct HealthServer {
    port: u16,
    state: Arc<HealthServerState>,
    cancel: CancellationToken,
}

impl HealthServer {
    /// Create a new health server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HealthServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run the health server until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HealthServerError` if binding fails or the HTTP server
    /// encounters a fatal error while running.
    pub async fn run(self) -> Result<(), HealthServerError> {
        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/healthz", get(liveness_handler))
            .route("/readyz", get(readiness_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HealthServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Health server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HealthServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<HealthServerState>>) -> impl IntoResponse {
    if state.mux.connected() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            let body = handle.render();
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                body,
            )
        },
    )
}

fn build_health_response(state: &HealthServerState) -> HealthResponse {
    let mux = &state.mux;
    let connection_state = mux.state();
    let stats = mux.stats();

    let stream = StreamInfo {
        state: connection_state.as_str().to_string(),
        connected: mux.connected(),
        enabled: mux.enabled(),
        reconnect_attempts: mux.reconnect_attempts(),
    };

    HealthResponse {
        status: determine_health_status(&stream, connection_state),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        stream,
        subscriptions: SubscriptionInfo {
            symbols: stats.symbols,
            callbacks: stats.callbacks,
        },
    }
}

const fn determine_health_status(stream: &StreamInfo, state: ConnectionState) -> HealthStatus {
    if stream.connected {
        HealthStatus::Healthy
    } else if matches!(state, ConnectionState::Disabled) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Health server errors.
#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_info(connected: bool, enabled: bool, state: &str) -> StreamInfo {
        StreamInfo {
            state: state.to_string(),
            connected,
            enabled,
            reconnect_attempts: 0,
        }
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Healthy).unwrap(),
            "\"healthy\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn connected_stream_is_healthy() {
        let info = stream_info(true, true, "connected");
        assert_eq!(
            determine_health_status(&info, ConnectionState::Connected),
            HealthStatus::Healthy
        );
    }

    #[test]
    fn disabled_stream_is_degraded() {
        let info = stream_info(false, false, "disabled");
        assert_eq!(
            determine_health_status(&info, ConnectionState::Disabled),
            HealthStatus::Degraded
        );
    }

    #[test]
    fn disconnected_stream_is_unhealthy() {
        let info = stream_info(false, true, "reconnecting");
        assert_eq!(
            determine_health_status(&info, ConnectionState::Reconnecting),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            determine_health_status(&info, ConnectionState::Halted),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn stream_info_serializes_connectivity() {
        let info = stream_info(false, true, "halted");
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"state\":\"halted\""));
        assert!(json.contains("\"connected\":false"));
    }
}
