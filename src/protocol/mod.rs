//! Appliance session protocol.
//!
//! JSON messages travel over the [`SecureChannel`](crate::crypto::SecureChannel).
//! The appliance opens every session: right after the transport connects it
//! POSTs `/ei/initialValues`, carrying the session id and the first message
//! id this side must use.
//!
//! ## Message Flow
//!
//! ```text
//! Application                          Appliance
//!    |                                     |
//!    |<---- POST /ei/initialValues --------|  sID, edMsgID
//!    |----- RESPONSE (identity) ---------->|
//!    |----- GET /ci/services ------------->|  msgID = edMsgID
//!    |----- GET /ci/authentication ------->|  msgID = edMsgID + 1, nonce
//!    |----- GET /ci/info, /iz/info, ... -->|
//!    |----- NOTIFY /ei/deviceReady ------->|
//!    |----- GET /ro/allMandatoryValues --->|
//!    |                                     |
//!    |<---- RESPONSE / NOTIFY -------------|  dispatched by resource
//!    |----- POST /ro/values -------------->|  validated against the catalog
//! ```
//!
//! ## State Machine
//!
//! | State               | Description                        | Valid Transitions          |
//! |---------------------|------------------------------------|----------------------------|
//! | `Disconnected`      | No transport                       | → AwaitingHandshake        |
//! | `AwaitingHandshake` | Connected, nothing received yet    | → Active, Closed           |
//! | `Active`            | Handshake processed                | → AwaitingHandshake, Closed|
//! | `Closed`            | Session terminated                 | → AwaitingHandshake        |
//!
//! Reconnecting calls [`Session::begin`] again, which forgets the session id,
//! the message counter and the service table.
//!
//! ## Dispatch
//!
//! RESPONSE and NOTIFY messages are routed through [`RESOURCE_HANDLERS`].
//! Unknown resources are reported as [`Report::Unhandled`] and never end the
//! session.

mod dispatch;
mod message;
mod session;

pub use dispatch::{handler_for, Report, ResourceHandler, RESOURCE_HANDLERS};
pub use message::{Action, Message, SessionId};
pub use session::{DeviceIdentity, Outcome, Session, SessionState};

/// Resource the appliance POSTs to open a session.
pub const HANDSHAKE_RESOURCE: &str = "/ei/initialValues";

/// Resource used for value reads and writes.
pub const VALUES_RESOURCE: &str = "/ro/values";
