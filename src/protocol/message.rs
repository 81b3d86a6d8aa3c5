//! Wire messages exchanged with the appliance.
//!
//! ```json
//! {"sID":123,"msgID":456,"resource":"/ro/values","version":1,"action":"GET","data":[{...}]}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// Read a resource
    Get,
    /// Write a resource (or the device's session opener)
    Post,
    /// Answer to a GET/POST
    Response,
    /// Unsolicited update
    Notify,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Response => "RESPONSE",
            Self::Notify => "NOTIFY",
        })
    }
}

/// Session id assigned by the appliance.
///
/// Appliances send a number; the value is echoed back verbatim either way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionId {
    /// Numeric id
    Number(u64),
    /// Textual id
    Text(String),
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for SessionId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

/// Protocol message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Session id
    #[serde(rename = "sID")]
    pub session_id: SessionId,
    /// Message id
    #[serde(rename = "msgID")]
    pub msg_id: u64,
    /// Resource path, e.g. `/ro/values`
    pub resource: String,
    /// Resource version
    pub version: u32,
    /// Action
    pub action: Action,
    /// Payload entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Value>>,
    /// Device error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
}

impl Message {
    /// Create an outbound request. `data` is wrapped into a one-element array.
    pub fn request(
        session_id: SessionId,
        msg_id: u64,
        resource: &str,
        version: u32,
        action: Action,
        data: Option<Value>,
    ) -> Self {
        Self {
            session_id,
            msg_id,
            resource: resource.to_string(),
            version,
            action,
            data: data.map(|d| vec![d]),
            code: None,
        }
    }

    /// Answer this message with `payload`, echoing its ids and resource.
    pub fn reply(&self, payload: Value) -> Self {
        Self {
            session_id: self.session_id.clone(),
            msg_id: self.msg_id,
            resource: self.resource.clone(),
            version: self.version,
            action: Action::Response,
            data: Some(vec![payload]),
            code: None,
        }
    }

    /// First payload entry, if any.
    pub fn first_data(&self) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.first())
    }

    /// Serialize to compact JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deserialize from raw UTF-8 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
