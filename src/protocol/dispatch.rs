//! Resource dispatch table and handler results.

use std::collections::BTreeMap;

use phf::phf_map;
use serde::Serialize;

use super::message::{Action, SessionId};
use crate::catalog::ValueReport;

/// What to do with a RESPONSE/NOTIFY for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceHandler {
    /// Acknowledge, nothing to extract
    NoOp,
    /// Populate the service version table
    Services,
    /// Decode a value dump through the catalog
    Values,
}

/// Handlers for inbound RESPONSE/NOTIFY messages, by resource.
pub static RESOURCE_HANDLERS: phf::Map<&'static str, ResourceHandler> = phf_map! {
    // identity / network info
    "/iz/info" => ResourceHandler::NoOp,
    "/ci/info" => ResourceHandler::NoOp,
    "/ni/info" => ResourceHandler::NoOp,
    "/ci/registeredDevices" => ResourceHandler::NoOp,
    "/ci/authentication" => ResourceHandler::NoOp,
    // descriptions are requested but not interpreted
    "/ro/descriptionChange" => ResourceHandler::NoOp,
    "/ro/allDescriptionChanges" => ResourceHandler::NoOp,
    "/ci/services" => ResourceHandler::Services,
    "/ro/allMandatoryValues" => ResourceHandler::Values,
    "/ro/values" => ResourceHandler::Values,
};

/// Look up the handler for a resource.
pub fn handler_for(resource: &str) -> Option<ResourceHandler> {
    RESOURCE_HANDLERS.get(resource).copied()
}

/// Result of handling one inbound message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    /// Acknowledged without extracting anything
    NoOp {
        /// Resource
        resource: String,
    },
    /// Handshake completed
    Handshake {
        /// Session id captured from the device
        session_id: SessionId,
    },
    /// Service table received
    ServiceList {
        /// service → version
        services: BTreeMap<String, u32>,
    },
    /// Values decoded through the catalog
    Values {
        /// Resource the values came from
        resource: String,
        /// Decoded values
        values: ValueReport,
    },
    /// Device answered with an error code
    Error {
        /// Device error code
        error: i64,
        /// Resource
        resource: String,
    },
    /// Resource or action this session does not handle
    Unhandled {
        /// Resource
        resource: String,
        /// Action
        action: Action,
    },
}
