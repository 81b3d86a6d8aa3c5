//! Blocking driver tying a transport, a secure channel and a session together.
//!
//! [`Session`] decides what to send; [`DeviceConnection`] performs the I/O and
//! applies the error policy:
//!
//! | Failure                         | Result                                   |
//! |---------------------------------|------------------------------------------|
//! | frame fails framing/auth/padding| `Err(HcError::Channel)`, session closed  |
//! | transport send/receive fails    | `Err(HcError::Transport)`                |
//! | message is not valid JSON       | [`Inbound::Skipped`], session unchanged  |
//! | message is out of place         | [`Inbound::Skipped`], session unchanged  |
//! | handshake fan-out send fails    | rest still sent, first `Err` returned    |
//!
//! Nothing is retried. After a fatal error the caller reconnects, which
//! resets the channel and starts a new session.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::catalog::FeatureCatalog;
use crate::crypto::SecureChannel;
use crate::error::{HcError, Result};
use crate::protocol::{Action, DeviceIdentity, Message, Report, Session, VALUES_RESOURCE};
use crate::transport::{Transport, WireFrame};

/// What one call to [`DeviceConnection::recv`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Message handled
    Report(Report),
    /// Message dropped without affecting the session
    Skipped {
        /// Why it was dropped
        reason: String,
    },
    /// The transport has no more messages
    Disconnected,
}

/// Connection to one appliance.
pub struct DeviceConnection<T: Transport> {
    transport: T,
    channel: SecureChannel,
    session: Session,
}

impl<T: Transport> DeviceConnection<T> {
    /// Assemble a connection. Nothing is opened until [`connect`](Self::connect).
    pub fn new(
        transport: T,
        channel: SecureChannel,
        catalog: Arc<FeatureCatalog>,
        identity: DeviceIdentity,
    ) -> Self {
        Self {
            transport,
            channel,
            session: Session::new(catalog, identity),
        }
    }

    /// Open the transport and wait for the appliance's handshake.
    ///
    /// Chain state is reset, so this also serves to reconnect.
    pub fn connect(&mut self) -> Result<()> {
        self.transport.connect()?;
        self.channel.reset()?;
        self.session.begin();
        tracing::info!(
            transport = self.transport.name(),
            self_encrypted = self.channel.is_self_encrypted(),
            "connected, awaiting handshake"
        );
        Ok(())
    }

    /// Receive and handle the next message.
    ///
    /// Replies the session produces (the handshake fan-out) are sent before
    /// this returns. Every reply is attempted and spends its message id; if
    /// any send failed, the first failure is returned instead of the report.
    pub fn recv(&mut self) -> Result<Inbound> {
        let Some(frame) = self.transport.recv()? else {
            tracing::info!("transport drained");
            return Ok(Inbound::Disconnected);
        };

        let plaintext = self.open(&frame)?;
        let msg = match Message::from_slice(&plaintext) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(error = %e, "dropping unparseable message");
                return Ok(Inbound::Skipped {
                    reason: format!("invalid message: {e}"),
                });
            },
        };
        tracing::debug!(
            action = %msg.action,
            resource = %msg.resource,
            msg_id = msg.msg_id,
            "RX: {}",
            String::from_utf8_lossy(&plaintext)
        );

        let outcome = match self.session.handle(&msg) {
            Ok(outcome) => outcome,
            Err(e @ HcError::Protocol(_)) => {
                tracing::warn!(error = %e, "dropping message");
                return Ok(Inbound::Skipped {
                    reason: e.to_string(),
                });
            },
            Err(e) => return Err(e),
        };

        let mut first_failure = None;
        for reply in &outcome.outbound {
            if let Err(e) = self.send_message(reply) {
                tracing::warn!(
                    error = %e,
                    resource = %reply.resource,
                    msg_id = reply.msg_id,
                    "send failed, continuing"
                );
                if first_failure.is_none() {
                    first_failure = Some(e);
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(Inbound::Report(outcome.report)),
        }
    }

    /// Send a request and return its message id.
    ///
    /// POST payloads are validated first; a rejected write sends nothing.
    pub fn request(
        &mut self,
        resource: &str,
        version: u32,
        action: Action,
        data: Option<Value>,
    ) -> Result<u64> {
        let msg = self.session.request(resource, version, action, data)?;
        self.send_message(&msg)?;
        Ok(msg.msg_id)
    }

    /// `GET` a resource at version 1.
    pub fn get(&mut self, resource: &str) -> Result<u64> {
        self.request(resource, 1, Action::Get, None)
    }

    /// Write one feature value through `/ro/values`.
    pub fn write_value(&mut self, uid: u32, value: Value) -> Result<u64> {
        self.request(
            VALUES_RESOURCE,
            1,
            Action::Post,
            Some(json!({ "uid": uid, "value": value })),
        )
    }

    /// Close the session and the transport.
    pub fn close(&mut self) -> Result<()> {
        self.session.close();
        self.transport.close()
    }

    /// Session state and negotiated values
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Frame protection in use
    pub fn channel(&self) -> &SecureChannel {
        &self.channel
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn open(&mut self, frame: &WireFrame) -> Result<Vec<u8>> {
        if !self.channel.is_self_encrypted() {
            return Ok(frame.as_bytes().to_vec());
        }
        self.channel.decrypt(frame.as_bytes()).map_err(|e| {
            tracing::error!(error = %e, len = frame.len(), "frame rejected, closing session");
            self.session.close();
            HcError::from(e)
        })
    }

    fn send_message(&mut self, msg: &Message) -> Result<()> {
        let json = msg.to_json()?;
        tracing::debug!(
            action = %msg.action,
            resource = %msg.resource,
            msg_id = msg.msg_id,
            "TX: {json}"
        );
        let frame = if self.channel.is_self_encrypted() {
            WireFrame::Binary(self.channel.encrypt(&json))
        } else {
            WireFrame::Text(json)
        };
        self.transport.send(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FeatureDescriptor;
    use crate::protocol::SessionState;
    use crate::transport::MemoryTransport;

    fn tls_pair() -> (DeviceConnection<MemoryTransport>, MemoryTransport) {
        let (app, mut device) = MemoryTransport::pair();
        device.connect().unwrap();
        let catalog = Arc::new(FeatureCatalog::new([FeatureDescriptor::new(
            600,
            "Cooking.Oven.Setting.Temperature",
        )
        .with_access("readwrite")
        .with_range(30, 250)]));
        let mut conn = DeviceConnection::new(
            app,
            SecureChannel::passthrough(),
            catalog,
            DeviceIdentity::default(),
        );
        conn.connect().unwrap();
        (conn, device)
    }

    fn send_text(device: &mut MemoryTransport, json: &str) {
        device.send(WireFrame::Text(json.to_string())).unwrap();
    }

    #[test]
    fn test_passthrough_handshake() {
        let (mut conn, mut device) = tls_pair();
        send_text(
            &mut device,
            r#"{"sID":9,"msgID":1,"resource":"/ei/initialValues","version":2,"action":"POST","data":[{"edMsgID":100}]}"#,
        );

        let inbound = conn.recv().unwrap();
        assert!(matches!(inbound, Inbound::Report(Report::Handshake { .. })));
        assert_eq!(conn.session().state(), SessionState::Active);

        let Some(WireFrame::Text(reply)) = device.recv().unwrap() else {
            panic!("expected text reply");
        };
        assert!(reply.contains(r#""action":"RESPONSE""#));
        assert_eq!(conn.transport().sent(), 9);
    }

    #[test]
    fn test_garbage_is_skipped() {
        let (mut conn, mut device) = tls_pair();
        send_text(&mut device, "not json");
        assert!(matches!(conn.recv().unwrap(), Inbound::Skipped { .. }));
        assert_eq!(conn.session().state(), SessionState::AwaitingHandshake);
        assert_eq!(conn.recv().unwrap(), Inbound::Disconnected);
    }

    #[test]
    fn test_request_before_handshake() {
        let (mut conn, _device) = tls_pair();
        assert!(matches!(
            conn.get("/ci/services"),
            Err(HcError::SessionNotEstablished)
        ));
    }

    #[test]
    fn test_write_value_validated() {
        let (mut conn, mut device) = tls_pair();
        send_text(
            &mut device,
            r#"{"sID":9,"msgID":1,"resource":"/ei/initialValues","version":2,"action":"POST","data":[{"edMsgID":5}]}"#,
        );
        conn.recv().unwrap();
        while device.recv().unwrap().is_some() {}

        assert!(matches!(
            conn.write_value(600, json!(300)),
            Err(HcError::Validation(_))
        ));
        assert_eq!(device.recv().unwrap(), None);

        let msg_id = conn.write_value(600, json!(180)).unwrap();
        assert_eq!(msg_id, 13);
        let Some(WireFrame::Text(sent)) = device.recv().unwrap() else {
            panic!("expected write");
        };
        assert!(sent.contains(r#""data":[{"uid":600,"value":180}]"#));
    }
}
