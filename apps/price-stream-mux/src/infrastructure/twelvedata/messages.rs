//! Twelve Data WebSocket Message Types
//!
//! Wire format types for the Twelve Data real-time price stream. The stream
//! is a plain JSON message channel: the client sends control requests with
//! an `action` field, the server pushes events discriminated by an `event`
//! field.
//!
//! # Message Types
//!
//! ## Control Requests (client -> server)
//! - `subscribe`: start streaming prices for a comma-joined symbol list
//! - `unsubscribe`: stop streaming prices for a symbol
//!
//! ## Events (server -> client)
//! - `price`: a real-time price update for one symbol
//! - `heartbeat`: periodic liveness signal (roughly every 10 seconds)
//! - `subscribe-status`: acknowledgement of a subscribe/unsubscribe request
//! - `error`: provider-reported failure with a numeric code
//!
//! # References
//!
//! - <https://twelvedata.com/docs#websocket>

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Control Requests (client -> server)
// =============================================================================

/// Control action verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    /// Start streaming the listed symbols.
    Subscribe,
    /// Stop streaming the listed symbols.
    Unsubscribe,
}

/// Parameters of a control request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlParams {
    /// Comma-joined uppercase symbols.
    pub symbols: String,
}

/// A subscribe/unsubscribe request.
///
/// # Wire Format (JSON)
/// ```json
/// {"action":"subscribe","params":{"symbols":"AAPL,MSFT"}}
/// {"action":"unsubscribe","params":{"symbols":"AAPL"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRequest {
    /// Action verb.
    pub action: ControlAction,
    /// Request parameters.
    pub params: ControlParams,
}

impl ControlRequest {
    /// Build a batch subscribe request for `symbols`.
    #[must_use]
    pub fn subscribe(symbols: &[String]) -> Self {
        Self {
            action: ControlAction::Subscribe,
            params: ControlParams {
                symbols: symbols.join(","),
            },
        }
    }

    /// Build an unsubscribe request for a single symbol.
    #[must_use]
    pub fn unsubscribe(symbol: &str) -> Self {
        Self {
            action: ControlAction::Unsubscribe,
            params: ControlParams {
                symbols: symbol.to_string(),
            },
        }
    }

    /// Serialize to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Events (server -> client)
// =============================================================================

/// Real-time price update for one symbol.
///
/// # Wire Format (JSON)
/// ```json
/// {"event":"price","symbol":"AAPL","currency":"USD","exchange":"NASDAQ",
///  "timestamp":1706889600,"price":189.50}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceMessage {
    /// Event type (always "price").
    pub event: String,

    /// Instrument symbol as reported by the provider.
    pub symbol: String,

    /// Last traded price.
    pub price: Decimal,

    /// Event time as unix seconds, when the provider includes it.
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub timestamp: Option<DateTime<Utc>>,

    /// Quote currency, when included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Reporting exchange, when included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
}

/// Periodic liveness signal.
///
/// # Wire Format (JSON)
/// ```json
/// {"event":"heartbeat","status":"ok"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMessage {
    /// Event type (always "heartbeat").
    pub event: String,

    /// Heartbeat status, when included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Per-symbol entry inside a subscription acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolAck {
    /// Acknowledged symbol.
    pub symbol: String,
}

/// Acknowledgement of a subscribe/unsubscribe request.
///
/// A successful socket open does not imply the provider accepted the
/// subscription; this message is the confirmation.
///
/// # Wire Format (JSON)
/// ```json
/// {"event":"subscribe-status","status":"ok",
///  "success":[{"symbol":"AAPL"}],"fails":[]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeStatusMessage {
    /// Event type ("subscribe-status" or "unsubscribe-status").
    pub event: String,

    /// Overall status: "ok" or "error".
    pub status: String,

    /// Symbols the provider accepted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success: Vec<SymbolAck>,

    /// Symbols the provider rejected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fails: Vec<SymbolAck>,
}

impl SubscribeStatusMessage {
    /// Whether the provider reported success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Provider-reported error with a numeric code.
///
/// # Wire Format (JSON)
/// ```json
/// {"event":"error","code":401,"message":"apikey is incorrect or not provided"}
/// ```
///
/// # Error Codes
/// - 401: Invalid or missing API key
/// - 429: Credit/rate limit exceeded
/// - anything else: other/unknown provider failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Event type (always "error").
    pub event: String,

    /// Error code.
    pub code: i32,

    /// Human-readable description.
    #[serde(default, alias = "msg")]
    pub message: String,
}

impl ErrorMessage {
    /// Check if this is an authorization failure.
    #[must_use]
    pub const fn is_auth_error(&self) -> bool {
        self.code == 401
    }

    /// Check if this is a rate limit error.
    #[must_use]
    pub const fn is_rate_limit_error(&self) -> bool {
        self.code == 429
    }
}

/// Any decoded provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderMessage {
    /// Price update.
    Price(PriceMessage),
    /// Liveness signal.
    Heartbeat(HeartbeatMessage),
    /// Subscription acknowledgement.
    SubscribeStatus(SubscribeStatusMessage),
    /// Provider-reported error.
    Error(ErrorMessage),
}

// =============================================================================
// Tests
// =============================================================================
