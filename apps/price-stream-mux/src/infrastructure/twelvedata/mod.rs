//! Twelve Data stream integration.
//!
//! WebSocket client, wire types and connection policies for the provider
//! price stream.

/// WebSocket client and connection lifecycle.
pub mod client;

/// JSON frame codec.
pub mod codec;

/// Inbound-silence detection.
pub mod liveness;

/// Wire format message types.
pub mod messages;

/// Reconnection backoff policy.
pub mod reconnect;

pub use client::{ClientConfig, ClientError, Command, QuoteStreamClient, StreamEvent};
pub use codec::{CodecError, JsonCodec};
pub use liveness::{LivenessConfig, LivenessState};
pub use messages::{
    ControlAction, ControlParams, ControlRequest, ErrorMessage, HeartbeatMessage, PriceMessage,
    ProviderMessage, SubscribeStatusMessage, SymbolAck,
};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
