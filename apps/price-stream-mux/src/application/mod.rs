//! Application layer modules.

/// The price stream multiplexer service.
pub mod services;
