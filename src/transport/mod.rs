//! Transport abstraction for appliance connections.
//!
//! The session layer only needs ordered, reliable delivery of whole websocket
//! messages. Anything that can provide that implements [`Transport`]: a real
//! websocket client in an application, [`MemoryTransport`] in tests and
//! simulators.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            DeviceConnection             │
//! │   (SecureChannel + Session, blocking)   │
//! └──────────────────┬──────────────────────┘
//!                    │ WireFrame
//!          ┌─────────┴─────────┐
//!          ▼                   ▼
//! ┌─────────────────┐ ┌─────────────────┐
//! │ websocket client│ │ MemoryTransport │
//! │  (application)  │ │  (in-process)   │
//! └─────────────────┘ └─────────────────┘
//! ```
//!
//! # Endpoint Selection
//!
//! | Kind            | URL                              | Frames  |
//! |-----------------|----------------------------------|---------|
//! | `SelfEncrypted` | `ws://<host>:80/homeconnect`     | binary  |
//! | `Tls`           | `wss://<host>:443/homeconnect`   | text    |

mod memory;

pub use memory::MemoryTransport;

use crate::error::Result;

/// Path of the appliance websocket endpoint.
pub const ENDPOINT_PATH: &str = "/homeconnect";

/// One websocket message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// Text message, used on TLS connections
    Text(String),
    /// Binary message, used for self-encrypted frames
    Binary(Vec<u8>),
}

impl WireFrame {
    /// Raw message bytes
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Message length in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Check if the message is empty
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// How the connection to an appliance is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransportKind {
    /// Plain websocket, frames protected by [`SecureChannel`](crate::crypto::SecureChannel)
    SelfEncrypted,
    /// TLS-PSK websocket, frames sent as-is (default)
    #[default]
    Tls,
}

impl TransportKind {
    /// Self-encrypted when the appliance has an IV, TLS otherwise.
    pub fn for_iv(has_iv: bool) -> Self {
        if has_iv {
            Self::SelfEncrypted
        } else {
            Self::Tls
        }
    }

    /// URL scheme
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::SelfEncrypted => "ws",
            Self::Tls => "wss",
        }
    }

    /// TCP port
    pub fn port(&self) -> u16 {
        match self {
            Self::SelfEncrypted => 80,
            Self::Tls => 443,
        }
    }

    /// Websocket URL for `host`.
    pub fn endpoint(&self, host: &str) -> String {
        format!("{}://{}:{}{}", self.scheme(), host, self.port(), ENDPOINT_PATH)
    }

    /// Get descriptive name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelfEncrypted => "AES-CBC/HMAC",
            Self::Tls => "TLS-PSK",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ws" | "aes" | "self-encrypted" => Ok(Self::SelfEncrypted),
            "wss" | "tls" | "tls-psk" => Ok(Self::Tls),
            _ => Err(format!("Unknown transport kind: {}", s)),
        }
    }
}

/// Message transport to one appliance.
///
/// Calls block. Implementations deliver messages whole and in order.
pub trait Transport: Send {
    /// Open the connection.
    fn connect(&mut self) -> Result<()>;

    /// Send one message.
    fn send(&mut self, frame: WireFrame) -> Result<()>;

    /// Next inbound message, or `None` once the stream has ended.
    fn recv(&mut self) -> Result<Option<WireFrame>>;

    /// Close the connection.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Get the transport name for logging.
    fn name(&self) -> &'static str;
}
