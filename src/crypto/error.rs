//! Error type for the secure channel.
//!
//! | Error            | Raised by              | Chain state afterwards         |
//! |------------------|------------------------|--------------------------------|
//! | `InvalidKey`     | construction           | not created                    |
//! | `InvalidIv`      | construction           | not created                    |
//! | `Framing`        | `decrypt`              | untouched                      |
//! | `Authentication` | `decrypt`              | receive tag untouched          |
//! | `Padding`        | `decrypt`              | receive tag advanced           |
//!
//! Every `decrypt` failure loses a frame from the peer's chain, so the
//! connection has to be rebuilt. None of them are retried internally.

use thiserror::Error;

/// Errors from channel construction and frame processing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Pre-shared key could not be decoded or is empty.
    #[error("Invalid pre-shared key: {0}")]
    InvalidKey(String),

    /// IV could not be decoded or is not one cipher block long.
    #[error("Invalid IV: {0}")]
    InvalidIv(String),

    /// Frame length is below the minimum or not block aligned.
    #[error("Malformed frame of {len} bytes (need at least 32, multiple of 16)")]
    Framing {
        /// Received frame length.
        len: usize,
    },

    /// Chained tag did not verify.
    #[error("Frame authentication failed, channel is desynchronized")]
    Authentication,

    /// Decrypted padding count does not fit the message.
    #[error("Invalid padding: pad length {pad_len} exceeds {len} decrypted bytes")]
    Padding {
        /// Trailing pad count byte.
        pad_len: usize,
        /// Decrypted message length.
        len: usize,
    },
}
