//! Multiplexer Configuration Settings
//!
//! Configuration types for the price stream multiplexer, loaded from
//! environment variables. There are no required variables: a missing or
//! placeholder API key disables the stream rather than failing startup,
//! and that disabled state is reported instead of retried forever.

use std::time::Duration;

/// Default WebSocket endpoint for the Twelve Data price stream.
pub const DEFAULT_STREAM_URL: &str = "wss://ws.twelvedata.com/v1/quotes/price";

/// The placeholder API key shipped in example configuration.
const PLACEHOLDER_API_KEY: &str = "demo";

/// Twelve Data API credentials.
///
/// A single static key, embedded in the connection URL as a query
/// parameter. The `Debug` implementation redacts it for safe logging.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Get the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Whether the key is absent or still the placeholder default.
    ///
    /// With placeholder credentials the multiplexer never opens a
    /// connection: the stream is disabled, not retried.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.api_key.is_empty() || self.api_key.eq_ignore_ascii_case(PLACEHOLDER_API_KEY)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Stream connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Provider WebSocket URL.
    pub url: String,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// How often stream liveness is checked.
    pub liveness_check_interval: Duration,
    /// Inbound silence longer than this marks the connection dead.
    pub stale_after: Duration,
    /// Capacity of the decoded-event channel.
    pub event_capacity: usize,
    /// Capacity of the control-command channel.
    pub command_capacity: usize,
    /// Capacity of the notice broadcast channel.
    pub notice_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            reconnect_delay_initial: Duration::from_millis(1000),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 3,
            liveness_check_interval: Duration::from_secs(10),
            stale_after: Duration::from_secs(60),
            event_capacity: 1024,
            command_capacity: 64,
            notice_capacity: 16,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete multiplexer configuration.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// API credentials.
    pub credentials: Credentials,
    /// Stream connection settings.
    pub stream: StreamSettings,
    /// Server port settings.
    pub server: ServerSettings,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::new(""),
            stream: StreamSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl MuxConfig {
    /// Create configuration from environment variables.
    ///
    /// A missing `TWELVEDATA_API_KEY` yields placeholder credentials (the
    /// stream stays disabled); every other variable falls back to its
    /// default.
    #[must_use]
    pub fn from_env() -> Self {
        let api_key = std::env::var("TWELVEDATA_API_KEY").unwrap_or_default();

        let defaults = StreamSettings::default();
        let stream = StreamSettings {
            url: std::env::var("PRICE_STREAM_URL").unwrap_or(defaults.url),
            reconnect_delay_initial: parse_env_duration_millis(
                "PRICE_STREAM_RECONNECT_DELAY_INITIAL_MS",
                defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "PRICE_STREAM_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "PRICE_STREAM_RECONNECT_DELAY_MULTIPLIER",
                defaults.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_env_u32(
                "PRICE_STREAM_MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
            liveness_check_interval: parse_env_duration_secs(
                "PRICE_STREAM_LIVENESS_CHECK_SECS",
                defaults.liveness_check_interval,
            ),
            stale_after: parse_env_duration_secs(
                "PRICE_STREAM_STALE_AFTER_SECS",
                defaults.stale_after,
            ),
            event_capacity: parse_env_usize("PRICE_STREAM_EVENT_CAPACITY", defaults.event_capacity),
            command_capacity: parse_env_usize(
                "PRICE_STREAM_COMMAND_CAPACITY",
                defaults.command_capacity,
            ),
            notice_capacity: parse_env_usize(
                "PRICE_STREAM_NOTICE_CAPACITY",
                defaults.notice_capacity,
            ),
        };

        let server = ServerSettings {
            health_port: parse_env_u16(
                "PRICE_STREAM_HEALTH_PORT",
                ServerSettings::default().health_port,
            ),
        };

        Self {
            credentials: Credentials::new(api_key),
            stream,
            server,
        }
    }
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
