//! Stream Codec Module
//!
//! Decodes raw JSON frames from the Twelve Data price stream into typed
//! [`ProviderMessage`] values.
//!
//! Every frame is a single JSON object discriminated by its `event` field.
//! Frames that are not valid JSON, are missing the discriminator, or carry
//! an unknown event kind decode to an error; the connection layer logs and
//! drops those frames rather than letting them take down the stream.

use crate::infrastructure::twelvedata::messages::{
    ErrorMessage, HeartbeatMessage, PriceMessage, ProviderMessage, SubscribeStatusMessage,
};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame carried an event kind this client does not know.
    #[error("unknown event kind: {0}")]
    UnknownEvent(String),

    /// Frame was structurally invalid.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// JSON codec for the price stream.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a raw text frame into a [`ProviderMessage`].
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object, has no `event`
    /// discriminator, or carries an unknown event kind.
    pub fn decode(&self, text: &str) -> Result<ProviderMessage, CodecError> {
        let value: serde_json::Value = serde_json::from_str(text.trim())?;

        let Some(event) = value.get("event").and_then(|v| v.as_str()) else {
            return Err(CodecError::InvalidFrame(
                "missing \"event\" discriminator".to_string(),
            ));
        };

        match event {
            "price" => {
                let msg: PriceMessage = serde_json::from_value(value)?;
                Ok(ProviderMessage::Price(msg))
            }
            "heartbeat" => {
                let msg: HeartbeatMessage = serde_json::from_value(value)?;
                Ok(ProviderMessage::Heartbeat(msg))
            }
            "subscribe-status" | "unsubscribe-status" => {
                let msg: SubscribeStatusMessage = serde_json::from_value(value)?;
                Ok(ProviderMessage::SubscribeStatus(msg))
            }
            "error" => {
                let msg: ErrorMessage = serde_json::from_value(value)?;
                Ok(ProviderMessage::Error(msg))
            }
            other => Err(CodecError::UnknownEvent(other.to_string())),
        }
    }

    /// Encode a value to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::infrastructure::twelvedata::messages::ControlRequest;

    #[test]
    fn decode_price_event() {
        let codec = JsonCodec::new();
        let frame = r#"{"event":"price","symbol":"SPY","price":512.3,"timestamp":1706889600}"#;

        match codec.decode(frame).unwrap() {
            ProviderMessage::Price(msg) => {
                assert_eq!(msg.symbol, "SPY");
                assert_eq!(msg.price, Decimal::new(5123, 1));
            }
            other => panic!("expected Price message, got {other:?}"),
        }
    }

    #[test]
    fn decode_heartbeat_event() {
        let codec = JsonCodec::new();
        let frame = r#"{"event":"heartbeat","status":"ok"}"#;

        assert!(matches!(
            codec.decode(frame).unwrap(),
            ProviderMessage::Heartbeat(_)
        ));
    }

    #[test]
    fn decode_subscribe_status_event() {
        let codec = JsonCodec::new();
        let frame = r#"{"event":"subscribe-status","status":"ok","success":[{"symbol":"AAPL"}]}"#;

        match codec.decode(frame).unwrap() {
            ProviderMessage::SubscribeStatus(msg) => assert!(msg.is_ok()),
            other => panic!("expected SubscribeStatus message, got {other:?}"),
        }
    }

    #[test]
    fn decode_unsubscribe_status_as_subscribe_status() {
        let codec = JsonCodec::new();
        let frame = r#"{"event":"unsubscribe-status","status":"ok"}"#;

        assert!(matches!(
            codec.decode(frame).unwrap(),
            ProviderMessage::SubscribeStatus(_)
        ));
    }

    #[test]
    fn decode_error_event() {
        let codec = JsonCodec::new();
        let frame = r#"{"event":"error","code":401,"message":"apikey is incorrect"}"#;

        match codec.decode(frame).unwrap() {
            ProviderMessage::Error(msg) => {
                assert_eq!(msg.code, 401);
                assert!(msg.is_auth_error());
            }
            other => panic!("expected Error message, got {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_invalid_json() {
        let codec = JsonCodec::new();
        assert!(matches!(
            codec.decode("not json at all"),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn decode_rejects_missing_event_field() {
        let codec = JsonCodec::new();
        assert!(matches!(
            codec.decode(r#"{"symbol":"AAPL","price":1.0}"#),
            Err(CodecError::InvalidFrame(_))
        ));
    }

    #[test]
    fn decode_rejects_unknown_event_kind() {
        let codec = JsonCodec::new();
        match codec.decode(r#"{"event":"candles","symbol":"AAPL"}"#) {
            Err(CodecError::UnknownEvent(kind)) => assert_eq!(kind, "candles"),
            other => panic!("expected UnknownEvent, got {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_non_object_frames() {
        let codec = JsonCodec::new();
        assert!(codec.decode("[1,2,3]").is_err());
        assert!(codec.decode("42").is_err());
    }

    #[test]
    fn encode_control_request() {
        let codec = JsonCodec::new();
        let request = ControlRequest::subscribe(&["AAPL".to_string()]);

        let json = codec.encode(&request).unwrap();
        assert!(json.contains(r#""action":"subscribe""#));
        assert!(json.contains(r#""symbols":"AAPL""#));
    }
}
