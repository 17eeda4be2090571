//! Configuration module.
//!
//! Environment-driven settings for the price stream multiplexer.

mod settings;

pub use settings::{Credentials, MuxConfig, ServerSettings, StreamSettings};
