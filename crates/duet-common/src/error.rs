//! Common error types for Duet.

use thiserror::Error;

/// Result type alias using Duet's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for Duet operations.
///
/// None of these are fatal to a session: the negotiation layer logs them and
/// waits for the next negotiation-needed event or signalling message.
#[derive(Debug, Error)]
pub enum Error {
    /// Signalling envelope or payload did not parse
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The media engine rejected a description, candidate or restart
    #[error("engine operation failed: {0}")]
    Engine(String),

    /// The signalling relay is unreachable or closed
    #[error("relay error: {0}")]
    Relay(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a malformed-message error from any displayable type.
    pub fn malformed(msg: impl std::fmt::Display) -> Self {
        Self::MalformedMessage(msg.to_string())
    }

    /// Create an engine error from any displayable type.
    pub fn engine(msg: impl std::fmt::Display) -> Self {
        Self::Engine(msg.to_string())
    }

    /// Create a relay error from any displayable type.
    pub fn relay(msg: impl std::fmt::Display) -> Self {
        Self::Relay(msg.to_string())
    }

    /// Create a config error from any displayable type.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::Config(msg.to_string())
    }

    /// Create an internal error from any displayable type.
    pub fn internal(msg: impl std::fmt::Display) -> Self {
        Self::Internal(msg.to_string())
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedMessage(_))
    }
}
