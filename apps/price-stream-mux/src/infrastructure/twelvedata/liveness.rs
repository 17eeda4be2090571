//! Stream Liveness Tracking
//!
//! The provider emits a heartbeat event roughly every ten seconds, so a
//! healthy connection is never silent for long. Liveness tracking records
//! the instant of the last inbound frame (any frame counts) and lets the
//! connection loop treat prolonged silence as a dead transport, turning a
//! silently stale stream into an ordinary close-driven reconnect.

use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Configuration for liveness checks.
#[derive(Debug, Clone)]
pub struct LivenessConfig {
    /// How often the connection loop inspects liveness.
    pub check_interval: Duration,
    /// Silence longer than this marks the connection dead.
    pub stale_after: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(10),
            stale_after: Duration::from_secs(60),
        }
    }
}

impl LivenessConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(check_interval: Duration, stale_after: Duration) -> Self {
        Self {
            check_interval,
            stale_after,
        }
    }

    /// Create configuration from [`StreamSettings`](crate::StreamSettings).
    #[must_use]
    pub const fn from_stream_settings(settings: &crate::StreamSettings) -> Self {
        Self {
            check_interval: settings.liveness_check_interval,
            stale_after: settings.stale_after,
        }
    }
}

/// Tracks the instant of the most recent inbound frame.
#[derive(Debug)]
pub struct LivenessState {
    last_frame: RwLock<Instant>,
}

impl Default for LivenessState {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessState {
    /// Create fresh state; the connection counts as alive right now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_frame: RwLock::new(Instant::now()),
        }
    }

    /// Record that a frame arrived.
    pub fn record_frame(&self) {
        *self.last_frame.write() = Instant::now();
    }

    /// How long the connection has been silent.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_frame.read().elapsed()
    }

    /// Whether the connection has been silent longer than `stale_after`.
    #[must_use]
    pub fn is_stale(&self, stale_after: Duration) -> bool {
        self.idle_for() >= stale_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_not_stale() {
        let state = LivenessState::new();
        assert!(!state.is_stale(Duration::from_secs(60)));
    }

    #[test]
    fn zero_threshold_is_immediately_stale() {
        let state = LivenessState::new();
        assert!(state.is_stale(Duration::ZERO));
    }

    #[test]
    fn recording_a_frame_resets_idle_time() {
        let state = LivenessState::new();
        std::thread::sleep(Duration::from_millis(20));
        assert!(state.idle_for() >= Duration::from_millis(20));

        state.record_frame();
        assert!(state.idle_for() < Duration::from_millis(20));
    }

    #[test]
    fn default_config_values() {
        let config = LivenessConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(10));
        assert_eq!(config.stale_after, Duration::from_secs(60));
    }
}
