//! Session state machine for one appliance connection.
//!
//! The session is pure: it consumes decoded [`Message`]s and returns the
//! messages to send in an [`Outcome`], without touching the transport.
//! [`DeviceConnection`](crate::connection::DeviceConnection) drives the I/O.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::dispatch::{handler_for, Report, ResourceHandler};
use super::message::{Action, Message, SessionId};
use super::HANDSHAKE_RESOURCE;
use crate::catalog::FeatureCatalog;
use crate::error::{HcError, Result};

/// Session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection
    Disconnected,
    /// Connected, waiting for the device's initial values
    AwaitingHandshake,
    /// Handshake processed, requests allowed
    Active,
    /// Session closed
    Closed,
}

/// Identity this application announces in the handshake reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceIdentity {
    /// Always `Application` for controllers
    pub device_type: String,
    /// Human readable name
    pub device_name: String,
    /// Identifier shown in the appliance's device list
    #[serde(rename = "deviceID")]
    pub device_id: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            device_type: "Application".to_string(),
            device_name: "hcpy".to_string(),
            device_id: "0badcafe".to_string(),
        }
    }
}

impl DeviceIdentity {
    fn payload(&self) -> Value {
        json!({
            "deviceType": self.device_type,
            "deviceName": self.device_name,
            "deviceID": self.device_id,
        })
    }
}

/// Messages to send and the report for one handled message.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// What the message meant
    pub report: Report,
    /// Messages to send, in order
    pub outbound: Vec<Message>,
}

impl Outcome {
    fn report(report: Report) -> Self {
        Self {
            report,
            outbound: Vec::new(),
        }
    }
}

/// Requests issued right after the handshake reply: (resource, version, action).
const HANDSHAKE_QUERIES: &[(&str, u32, Action)] = &[
    ("/ci/info", 2, Action::Get),
    ("/iz/info", 1, Action::Get),
    ("/ni/info", 1, Action::Get),
    ("/ei/deviceReady", 2, Action::Notify),
    ("/ro/allDescriptionChanges", 1, Action::Get),
    ("/ro/allMandatoryValues", 1, Action::Get),
];

/// Protocol session with one appliance.
#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    session_id: Option<SessionId>,
    next_tx_msg_id: u64,
    service_versions: BTreeMap<String, u32>,
    identity: DeviceIdentity,
    catalog: Arc<FeatureCatalog>,
}

impl Session {
    /// Create a disconnected session.
    pub fn new(catalog: Arc<FeatureCatalog>, identity: DeviceIdentity) -> Self {
        Self {
            state: SessionState::Disconnected,
            session_id: None,
            next_tx_msg_id: 0,
            service_versions: BTreeMap::new(),
            identity,
            catalog,
        }
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check if the handshake has been processed
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Session id captured from the handshake.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Message id the next outbound request will carry.
    pub fn next_msg_id(&self) -> u64 {
        self.next_tx_msg_id
    }

    /// Services the device reported, with their versions.
    pub fn service_versions(&self) -> &BTreeMap<String, u32> {
        &self.service_versions
    }

    /// Version of one service, if reported.
    pub fn service_version(&self, service: &str) -> Option<u32> {
        self.service_versions.get(service).copied()
    }

    /// Feature catalog used for decoding and validation.
    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }

    /// Identity sent in the handshake reply.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Start waiting for a handshake on a fresh connection.
    ///
    /// Clears everything learned from a previous connection.
    pub fn begin(&mut self) {
        self.state = SessionState::AwaitingHandshake;
        self.session_id = None;
        self.next_tx_msg_id = 0;
        self.service_versions.clear();
    }

    /// Close the session. Further messages are rejected.
    pub fn close(&mut self) {
        tracing::info!(session = ?self.session_id, "session closed");
        self.state = SessionState::Closed;
    }

    /// Handle one inbound message.
    ///
    /// A message carrying `code` becomes [`Report::Error`] whatever its
    /// action. Errors returned here concern this message only.
    pub fn handle(&mut self, msg: &Message) -> Result<Outcome> {
        if matches!(
            self.state,
            SessionState::Disconnected | SessionState::Closed
        ) {
            return Err(HcError::Protocol(format!(
                "Cannot handle {} {} in state {:?}",
                msg.action, msg.resource, self.state
            )));
        }

        if let Some(code) = msg.code {
            tracing::warn!(resource = %msg.resource, code, "device reported error");
            return Ok(Outcome::report(Report::Error {
                error: code,
                resource: msg.resource.clone(),
            }));
        }

        match msg.action {
            Action::Post if msg.resource == HANDSHAKE_RESOURCE => self.process_handshake(msg),
            Action::Post | Action::Get => {
                tracing::warn!(
                    resource = %msg.resource,
                    action = %msg.action,
                    "unknown request from device"
                );
                Ok(Outcome::report(Report::Unhandled {
                    resource: msg.resource.clone(),
                    action: msg.action,
                }))
            },
            Action::Response | Action::Notify => {
                if !self.is_active() {
                    return Err(HcError::Protocol(format!(
                        "{} {} before handshake",
                        msg.action, msg.resource
                    )));
                }
                self.dispatch(msg).map(Outcome::report)
            },
        }
    }

    /// Build an outbound request and allocate its message id.
    ///
    /// POST payloads are validated against the catalog first; a rejected
    /// write returns [`HcError::Validation`] and leaves the counter alone.
    /// Once built, the message id is spent whether or not the send succeeds.
    pub fn request(
        &mut self,
        resource: &str,
        version: u32,
        action: Action,
        data: Option<Value>,
    ) -> Result<Message> {
        if !self.is_active() {
            return Err(HcError::SessionNotEstablished);
        }
        let session_id = self
            .session_id
            .clone()
            .ok_or(HcError::SessionNotEstablished)?;

        if action == Action::Post {
            let payload = data.as_ref().unwrap_or(&Value::Null);
            let feature = self.catalog.validate_write(payload)?;
            tracing::info!(feature = %feature.name, uid = feature.uid, "write accepted");
        }

        let msg = Message::request(
            session_id,
            self.next_tx_msg_id,
            resource,
            version,
            action,
            data,
        );
        self.next_tx_msg_id += 1;
        Ok(msg)
    }

    fn process_handshake(&mut self, msg: &Message) -> Result<Outcome> {
        let ed_msg_id = msg
            .first_data()
            .and_then(|d| d.get("edMsgID"))
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                HcError::Protocol(format!("{HANDSHAKE_RESOURCE} without integer edMsgID"))
            })?;

        self.session_id = Some(msg.session_id.clone());
        self.next_tx_msg_id = ed_msg_id;
        self.state = SessionState::Active;
        tracing::info!(session = %msg.session_id, ed_msg_id, "handshake received");

        let mut outbound = vec![msg.reply(self.identity.payload())];
        outbound.push(self.request("/ci/services", 1, Action::Get, None)?);
        outbound.push(self.request(
            "/ci/authentication",
            2,
            Action::Get,
            Some(json!({ "nonce": auth_nonce() })),
        )?);
        for &(resource, version, action) in HANDSHAKE_QUERIES {
            outbound.push(self.request(resource, version, action, None)?);
        }

        Ok(Outcome {
            report: Report::Handshake {
                session_id: msg.session_id.clone(),
            },
            outbound,
        })
    }

    fn dispatch(&mut self, msg: &Message) -> Result<Report> {
        let resource = msg.resource.clone();
        let Some(handler) = handler_for(&msg.resource) else {
            tracing::warn!(%resource, action = %msg.action, "unknown resource");
            return Ok(Report::Unhandled {
                resource,
                action: msg.action,
            });
        };

        match handler {
            ResourceHandler::NoOp => Ok(Report::NoOp { resource }),
            ResourceHandler::Services => self.populate_services(msg),
            ResourceHandler::Values => match &msg.data {
                Some(entries) => Ok(Report::Values {
                    values: self.catalog.decode_values(entries),
                    resource,
                }),
                None => {
                    tracing::debug!(%resource, "value message without data");
                    Ok(Report::NoOp { resource })
                },
            },
        }
    }

    fn populate_services(&mut self, msg: &Message) -> Result<Report> {
        #[derive(Deserialize)]
        struct ServiceEntry {
            service: String,
            version: u32,
        }

        let entries = msg.data.as_deref().unwrap_or_default();
        let mut services = BTreeMap::new();
        for entry in entries {
            let entry = ServiceEntry::deserialize(entry)
                .map_err(|e| HcError::Protocol(format!("malformed service entry: {e}")))?;
            services.insert(entry.service, entry.version);
        }

        tracing::debug!(?services, "services");
        self.service_versions.clone_from(&services);
        Ok(Report::ServiceList { services })
    }
}

/// Random token for `/ci/authentication`; appliances reject `=` padding.
fn auth_nonce() -> String {
    let mut token = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut token);
    URL_SAFE_NO_PAD.encode(token)
}
