//! Write validation against the feature catalog.

use serde_json::{Number, Value};
use thiserror::Error;

use super::{FeatureCatalog, FeatureDescriptor};

/// Reasons an outbound write is refused before anything is sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Payload is not a JSON object.
    #[error("Write payload must be an object")]
    NotAnObject,

    /// `uid` missing.
    #[error("Unable to configure appliance: uid is required")]
    MissingUid,

    /// `uid` present but not an integer.
    #[error("Unable to configure appliance: uid must be an integer, got {0}")]
    UidNotInteger(String),

    /// `value` missing.
    #[error("Unable to configure appliance: value is required")]
    MissingValue,

    /// `uid` not in the catalog.
    #[error("Unable to configure appliance: uid {0} is not valid")]
    UnknownUid(Number),

    /// Feature declares no access rights.
    #[error("Unable to configure appliance: feature {name} with uid {uid} does not declare access")]
    NoAccess {
        /// Feature name
        name: String,
        /// Feature uid
        uid: u32,
    },

    /// Feature is not `readwrite` or `writeonly`.
    #[error("Unable to configure appliance: feature {name} with uid {uid} has access {access}")]
    NotWritable {
        /// Feature name
        name: String,
        /// Feature uid
        uid: u32,
        /// Declared access
        access: String,
    },

    /// Value must be an integer for enumerated or ranged features.
    #[error("Unable to configure appliance: value {value} for {name} must be an integer")]
    ValueNotInteger {
        /// Feature name
        name: String,
        /// Offending value
        value: String,
    },

    /// Value is not one of the enumerated codes.
    #[error("Unable to configure appliance: value {value} is not valid for {name}, allowed values are {allowed:?}")]
    ValueNotAllowed {
        /// Feature name
        name: String,
        /// Offending value
        value: i64,
        /// Allowed codes
        allowed: Vec<String>,
    },

    /// Value is outside `min..=max`.
    #[error("Unable to configure appliance: value {value} for {name} must be in the range {min} to {max}")]
    OutOfRange {
        /// Feature name
        name: String,
        /// Offending value
        value: i64,
        /// Lower bound, `i64::MIN` when undeclared
        min: i64,
        /// Upper bound, `i64::MAX` when undeclared
        max: i64,
    },
}

impl FeatureCatalog {
    /// Check a `{uid, value}` write payload.
    ///
    /// Returns the targeted feature when the write is allowed.
    pub fn validate_write(&self, data: &Value) -> Result<&FeatureDescriptor, ValidationError> {
        let object = data.as_object().ok_or(ValidationError::NotAnObject)?;

        let uid = object.get("uid").ok_or(ValidationError::MissingUid)?;
        let uid = match uid {
            Value::Number(n) if n.is_i64() || n.is_u64() => n,
            other => return Err(ValidationError::UidNotInteger(other.to_string())),
        };
        let value = object.get("value").ok_or(ValidationError::MissingValue)?;

        let feature = uid
            .as_u64()
            .and_then(|uid| u32::try_from(uid).ok())
            .and_then(|uid| self.lookup(uid))
            .ok_or_else(|| ValidationError::UnknownUid(uid.clone()))?;

        tracing::debug!(name = %feature.name, uid = feature.uid, "validating write");

        let access = feature.access.as_ref().ok_or_else(|| ValidationError::NoAccess {
            name: feature.name.clone(),
            uid: feature.uid,
        })?;
        if !access.is_writable() {
            return Err(ValidationError::NotWritable {
                name: feature.name.clone(),
                uid: feature.uid,
                access: access.to_string(),
            });
        }

        let needs_integer = feature.allowed_values.is_some()
            || feature.min.is_some()
            || feature.max.is_some();
        if !needs_integer {
            return Ok(feature);
        }

        let number = value.as_i64().ok_or_else(|| ValidationError::ValueNotInteger {
            name: feature.name.clone(),
            value: value.to_string(),
        })?;

        if let Some(allowed) = &feature.allowed_values {
            if !allowed.contains_key(&number.to_string()) {
                return Err(ValidationError::ValueNotAllowed {
                    name: feature.name.clone(),
                    value: number,
                    allowed: allowed.keys().cloned().collect(),
                });
            }
        }

        let min = feature.min.unwrap_or(i64::MIN);
        let max = feature.max.unwrap_or(i64::MAX);
        if !(min..=max).contains(&number) {
            return Err(ValidationError::OutOfRange {
                name: feature.name.clone(),
                value: number,
                min,
                max,
            });
        }

        Ok(feature)
    }
}
