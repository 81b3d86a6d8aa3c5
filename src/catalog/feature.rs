//! Feature descriptors as produced by the featuremap/description converter.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Access rights of a feature.
///
/// Parsed case-insensitively; unrecognized strings are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Access {
    /// No access
    None,
    /// Read only
    Read,
    /// Write (without read)
    Write,
    /// Read and write
    ReadWrite,
    /// Write only
    WriteOnly,
    /// Anything else the appliance description declares
    Other(String),
}

impl Access {
    /// Whether the feature accepts writes from the application.
    ///
    /// Only `readwrite` and `writeonly` qualify.
    pub fn is_writable(&self) -> bool {
        matches!(self, Self::ReadWrite | Self::WriteOnly)
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Read => "read",
            Self::Write => "write",
            Self::ReadWrite => "readwrite",
            Self::WriteOnly => "writeonly",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for Access {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "read" => Self::Read,
            "write" => Self::Write,
            "readwrite" => Self::ReadWrite,
            "writeonly" => Self::WriteOnly,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for Access {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<Access> for String {
    fn from(access: Access) -> Self {
        access.as_str().to_string()
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata of one device data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    /// Numeric feature id (the catalog key).
    #[serde(skip)]
    pub uid: u32,

    /// Dotted feature path, e.g. `BSH.Common.Status.DoorState`.
    pub name: String,

    /// Access rights, when declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,

    /// Discrete value set: stringified code → label.
    #[serde(
        default,
        rename = "values",
        skip_serializing_if = "Option::is_none"
    )]
    pub allowed_values: Option<BTreeMap<String, String>>,

    /// Inclusive lower bound.
    #[serde(
        default,
        deserialize_with = "deserialize_bound",
        skip_serializing_if = "Option::is_none"
    )]
    pub min: Option<i64>,

    /// Inclusive upper bound.
    #[serde(
        default,
        deserialize_with = "deserialize_bound",
        skip_serializing_if = "Option::is_none"
    )]
    pub max: Option<i64>,

    /// Remaining description attributes (`refCID`, `available`, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl FeatureDescriptor {
    /// Descriptor with just a uid and name.
    pub fn new(uid: u32, name: impl Into<String>) -> Self {
        Self {
            uid,
            name: name.into(),
            access: None,
            allowed_values: None,
            min: None,
            max: None,
            extra: BTreeMap::new(),
        }
    }

    /// Set the access rights.
    pub fn with_access(mut self, access: impl Into<Access>) -> Self {
        self.access = Some(access.into());
        self
    }

    /// Add an allowed code and its label.
    pub fn with_value(mut self, code: i64, label: impl Into<String>) -> Self {
        self.allowed_values
            .get_or_insert_with(BTreeMap::new)
            .insert(code.to_string(), label.into());
        self
    }

    /// Set the inclusive range.
    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Last segment of the dotted name.
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }

    /// Label for a coded value, if the feature enumerates values.
    pub fn label_for(&self, code: &str) -> Option<&str> {
        self.allowed_values
            .as_ref()
            .and_then(|values| values.get(code))
            .map(String::as_str)
    }
}

/// Strip everything up to and including the last `.`.
pub(crate) fn short_name(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(_, tail)| tail)
}

/// Bounds come through as numbers or numeric strings.
fn deserialize_bound<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawBound {
        Int(i64),
        Text(String),
    }

    match Option::<RawBound>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawBound::Int(v)) => Ok(Some(v)),
        Some(RawBound::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("bound {s:?} is not an integer"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_access_case_insensitive() {
        assert_eq!(Access::from("ReadWrite"), Access::ReadWrite);
        assert_eq!(Access::from("WRITEONLY"), Access::WriteOnly);
        assert_eq!(Access::from("read"), Access::Read);
        assert_eq!(Access::from("mystery"), Access::Other("mystery".to_string()));
        assert!(Access::from("readWrite").is_writable());
        assert!(!Access::from("write").is_writable());
    }

    #[test]
    fn test_descriptor_from_converter_json() {
        let feature: FeatureDescriptor = serde_json::from_value(json!({
            "name": "BSH.Common.Setting.PowerState",
            "access": "readWrite",
            "available": "true",
            "values": {"1": "Off", "2": "On"},
            "min": "0",
            "max": 10
        }))
        .unwrap();

        assert_eq!(feature.access, Some(Access::ReadWrite));
        assert_eq!(feature.label_for("2"), Some("On"));
        assert_eq!(feature.min, Some(0));
        assert_eq!(feature.max, Some(10));
        assert_eq!(feature.extra.get("available"), Some(&json!("true")));
        assert_eq!(feature.short_name(), "PowerState");
    }

    #[test]
    fn test_bad_bound_rejected() {
        let result: Result<FeatureDescriptor, _> =
            serde_json::from_value(json!({"name": "X", "min": "low"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_short_name_without_dots() {
        assert_eq!(short_name("558"), "558");
        assert_eq!(short_name("a.b.c"), "c");
    }
}
