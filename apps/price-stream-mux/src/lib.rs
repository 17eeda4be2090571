#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::default_trait_access
    )
)]

//! Price Stream Mux - Market Price Subscription Multiplexer
//!
//! Maintains a single persistent WebSocket connection to the Twelve Data
//! price stream and multiplexes real-time price updates to any number of
//! in-process subscribers. Subscribers come and go independently of the
//! connection's own lifecycle; the subscription registry is the source of
//! truth that survives transport churn.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Core fan-out logic with no external dependencies
//!   - `registry`: symbol -> callback-set registry and dispatch
//!
//! - **Application**: The multiplexer service
//!   - `services`: connection ownership, edge-triggered control traffic,
//!     observable connectivity
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `twelvedata`: WebSocket client, wire types, backoff, liveness
//!   - `config`: environment-driven configuration
//!   - `health`: health check HTTP endpoint
//!   - `metrics`: Prometheus metrics
//!   - `telemetry`: tracing setup
//!
//! # Data Flow
//!
//! ```text
//!                      ┌─────────────┐     ┌──────────────┐──► callback 1
//! Twelve Data WS ─────►│   Client    │────►│ PriceStream  │──► callback 2
//!   (single conn)      │ (lifecycle) │     │     Mux      │──► callback N
//!                      └─────────────┘     └──────────────┘
//!                        reconnect w/        symbol -> callbacks
//!                        bounded backoff     edge-triggered control
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core fan-out types with no external dependencies.
pub mod domain;

/// Application layer - The multiplexer service.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::registry::{
    AddOutcome, PriceCallback, RemoveOutcome, Symbol, SymbolRegistry, normalize_symbol,
};

// Multiplexer service
pub use application::services::{ConnectionState, MuxStats, PriceStreamMux, StreamNotice};

// Infrastructure config
pub use infrastructure::config::{Credentials, MuxConfig, ServerSettings, StreamSettings};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Provider wire types and policies (for integration tests)
pub use infrastructure::twelvedata::{
    ControlRequest, ErrorMessage, PriceMessage, ProviderMessage, ReconnectConfig, ReconnectPolicy,
    SubscribeStatusMessage,
};

// Metrics
pub use infrastructure::metrics::init_metrics;
