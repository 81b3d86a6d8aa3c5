//! Chained AES-CBC / HMAC-SHA256 framing for self-encrypted connections.
//!
//! Appliances reachable over plain HTTP wrap every websocket message in a
//! frame that is encrypted and authenticated under keys derived from a
//! pre-shared key (PSK). Appliances reachable over TLS-PSK rely on the record
//! layer instead, and the channel passes bytes through untouched.
//!
//! # Key Derivation
//!
//! ```text
//! PSK ──[HMAC-SHA256 "ENC"]──► EncryptionKey (AES-256)
//!     └─[HMAC-SHA256 "MAC"]──► AuthKey       (HMAC-SHA256)
//! ```
//!
//! # Frame Format
//!
//! ```text
//! ┌──────────────────────────────────────────┬──────────────┐
//! │ AES-256-CBC(plaintext || pad)            │ tag (16)     │
//! └──────────────────────────────────────────┴──────────────┘
//!
//! pad = 0x00 || random(padLen - 2) || padLen        (2 <= padLen <= 17)
//! tag = HMAC(AuthKey, iv || sender || previousTag || ciphertext)[..16]
//! ```
//!
//! # Chaining
//!
//! Both the CBC state and the tags chain across frames for the lifetime of
//! the connection:
//!
//! - the CBC chaining block carries from one frame to the next, the IV is
//!   only consumed at stream start;
//! - each tag covers the previous tag of the same direction.
//!
//! A single dropped or corrupted frame desynchronizes the channel for good.
//! The caller has to reconnect, which calls [`SecureChannel::reset`].
//!
//! | Sender      | Direction byte |
//! |-------------|----------------|
//! | Application | `0x45` (`E`)   |
//! | Device      | `0x43` (`C`)   |

mod channel;
mod error;
mod hmac_auth;
mod keys;

pub use channel::{ChannelRole, SecureChannel};
pub use error::ChannelError;
pub use hmac_auth::{ChainedMac, Sender};
pub use keys::{decode_base64url, ChannelIv, KeyMaterial, PreSharedKey};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Truncated HMAC tag appended to each frame.
pub const TAG_SIZE: usize = 16;

/// Smallest well-formed frame: one cipher block plus the tag.
pub const MIN_FRAME_SIZE: usize = BLOCK_SIZE + TAG_SIZE;

/// Chaining tag as carried on the wire.
pub type Tag = [u8; TAG_SIZE];
