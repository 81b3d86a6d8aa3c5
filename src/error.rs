//! Error types for the hclink session layer.
//!
//! # Fatal vs Recoverable
//!
//! Errors split by what the caller has to do next:
//!
//! - **Fatal**: the connection can no longer be trusted and must be rebuilt
//!   by the caller (`Channel`, `Transport`, `Io`). Nothing is retried here.
//! - **Recoverable**: one message or one request is affected, session state
//!   is untouched (`Protocol`, `Validation`, `SessionNotEstablished`, `Json`).
//!
//! Use [`HcError::is_fatal`] rather than matching variants by hand.

use thiserror::Error;

use crate::catalog::ValidationError;
use crate::crypto::ChannelError;

/// hclink errors.
#[derive(Error, Debug)]
pub enum HcError {
    /// Frame could not be opened: framing, authentication or padding.
    ///
    /// Preserves the channel error via `#[source]`.
    #[error("Channel error: {0}")]
    Channel(#[source] ChannelError),

    /// Outbound write rejected by the feature catalog; nothing was sent.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Malformed or unexpected message.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Operation requires a completed handshake.
    #[error("Session not established")]
    SessionNotEstablished,

    /// Send or receive failed in the transport collaborator.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Feature catalog could not be loaded.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for hclink operations
pub type Result<T> = std::result::Result<T, HcError>;

impl HcError {
    /// Whether the connection has to be torn down and rebuilt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Channel(_) | Self::Transport(_) | Self::Io(_))
    }
}

impl From<ChannelError> for HcError {
    fn from(err: ChannelError) -> Self {
        HcError::Channel(err)
    }
}

impl From<toml::de::Error> for HcError {
    fn from(err: toml::de::Error) -> Self {
        HcError::Config(format!("Failed to parse config: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_errors_are_fatal() {
        let err: HcError = ChannelError::Authentication.into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("Channel"));
    }

    #[test]
    fn test_validation_errors_are_recoverable() {
        let err: HcError = ValidationError::MissingUid.into();
        assert!(!err.is_fatal());
        assert!(!HcError::Protocol("bad".into()).is_fatal());
        assert!(!HcError::SessionNotEstablished.is_fatal());
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let err: HcError = ChannelError::Framing { len: 3 }.into();
        let source = err.source();
        assert!(source.is_some());
        assert!(source.unwrap().to_string().contains("3 bytes"));
    }
}
