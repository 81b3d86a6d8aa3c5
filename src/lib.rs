//! # hclink - Home Connect appliance session layer
//!
//! Talks to Home Connect appliances over their local websocket: protects
//! frames with the appliance's pre-shared key, answers the appliance's
//! handshake, and reads and writes feature values checked against the
//! appliance's feature catalog.
//!
//! ## Features
//!
//! - **Secure channel**: AES-256-CBC frames chained with truncated HMAC-SHA256 tags
//! - **Session protocol**: handshake, message id allocation, resource dispatch
//! - **Feature catalog**: value decoding and write validation before anything is sent
//! - **Transport-agnostic**: blocking [`Transport`] trait, in-memory pair for tests
//!
//! ### Architecture
//!
//! ```text
//!  application                                          appliance
//!       |                                                   |
//!  DeviceConnection ── Session ── FeatureCatalog            |
//!       |                                                   |
//!  SecureChannel (AES-CBC + chained HMAC, or passthrough)   |
//!       |                                                   |
//!  Transport ───────────── websocket frames ────────────────|
//! ```
//!
//! ### Frame Format (self-encrypted mode)
//!
//! | Field      | Size      | Notes                                        |
//! |------------|-----------|----------------------------------------------|
//! | ciphertext | n × 16    | AES-256-CBC, chained across frames           |
//! | tag        | 16        | HMAC-SHA256(iv ‖ dir ‖ previous tag ‖ ct)    |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hclink::{Config, DeviceConnection, ChannelRole, Inbound};
//!
//! let config = Config::from_file("hclink.toml")?;
//! let channel = config.device.open_channel(ChannelRole::Application)?;
//! let mut conn = DeviceConnection::new(
//!     my_websocket,
//!     channel,
//!     config.load_catalog()?,
//!     config.identity.clone(),
//! );
//!
//! conn.connect()?;
//! loop {
//!     match conn.recv()? {
//!         Inbound::Report(report) => println!("{}", serde_json::to_string(&report)?),
//!         Inbound::Skipped { .. } => continue,
//!         Inbound::Disconnected => break,
//!     }
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod connection;
pub mod crypto;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-exports for convenience
pub use catalog::{Access, FeatureCatalog, FeatureDescriptor, ValidationError, ValueReport};
pub use config::{Config, DeviceConfig};
pub use connection::{DeviceConnection, Inbound};
pub use crypto::{ChannelError, ChannelIv, ChannelRole, PreSharedKey, SecureChannel};
pub use error::{HcError, Result};
pub use protocol::{Action, DeviceIdentity, Message, Report, Session, SessionId, SessionState};
pub use transport::{MemoryTransport, Transport, TransportKind, WireFrame};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
