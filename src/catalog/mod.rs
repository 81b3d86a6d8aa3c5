//! Read-only feature catalog.
//!
//! The catalog maps numeric feature ids (uids) to their dotted names, access
//! rights and value constraints. It is produced out of band from an
//! appliance's featuremap and description documents, loaded once, and shared
//! read-only by every session talking to that appliance.
//!
//! # Input Format
//!
//! ```json
//! {
//!   "description": { "brand": "...", "model": "..." },
//!   "features": {
//!     "558": {
//!       "name": "BSH.Common.Status.DoorState",
//!       "access": "read",
//!       "values": { "0": "Open", "1": "Closed" }
//!     }
//!   }
//! }
//! ```
//!
//! A bare `features` map is accepted as well. Keys are decimal uids or
//! `0x`-prefixed hex uids.

mod feature;
mod validation;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{HcError, Result};

pub use feature::{Access, FeatureDescriptor};
pub use validation::ValidationError;

/// Decoded values keyed by short feature name.
pub type ValueReport = BTreeMap<String, Value>;

/// uid-indexed feature metadata of one appliance.
#[derive(Debug, Clone, Default)]
pub struct FeatureCatalog {
    features: HashMap<u32, FeatureDescriptor>,
    description: BTreeMap<String, String>,
}

impl FeatureCatalog {
    /// Build a catalog from descriptors, keyed by their `uid`.
    pub fn new(features: impl IntoIterator<Item = FeatureDescriptor>) -> Self {
        Self {
            features: features.into_iter().map(|f| (f.uid, f)).collect(),
            description: BTreeMap::new(),
        }
    }

    /// Parse converter output or a bare features map.
    pub fn from_json(json: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(json)
            .map_err(|e| HcError::Catalog(format!("Failed to parse catalog: {e}")))?;
        let Value::Object(mut root) = root else {
            return Err(HcError::Catalog("catalog must be a JSON object".to_string()));
        };

        let (features, description) = match root.remove("features") {
            Some(Value::Object(features)) => (features, root.remove("description")),
            Some(_) => {
                return Err(HcError::Catalog(
                    "\"features\" must be an object".to_string(),
                ))
            },
            None => (root, None),
        };

        let mut catalog = Self::new(parse_features(features)?);
        if let Some(Value::Object(description)) = description {
            catalog.description = description
                .into_iter()
                .filter_map(|(k, v)| match v {
                    Value::String(s) => Some((k, s)),
                    _ => None,
                })
                .collect();
        }

        tracing::debug!(features = catalog.len(), "loaded feature catalog");
        Ok(catalog)
    }

    /// Load a catalog file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            HcError::Catalog(format!("Failed to read catalog {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Look up a feature by uid.
    pub fn lookup(&self, uid: u32) -> Option<&FeatureDescriptor> {
        self.features.get(&uid)
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Check if the catalog has no features
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterate over all features in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureDescriptor> {
        self.features.values()
    }

    /// Machine description (vendor, model, versions).
    pub fn description(&self) -> &BTreeMap<String, String> {
        &self.description
    }

    /// Resolve `[{uid, value}, ...]` entries into a [`ValueReport`].
    ///
    /// Known uids are reported under the last segment of their name, with
    /// enumerated codes replaced by their label. Unknown uids keep the uid as
    /// name and the raw value. Entries without `uid` or `value` are skipped.
    pub fn decode_values(&self, entries: &[Value]) -> ValueReport {
        let mut report = ValueReport::new();

        for entry in entries {
            let (Some(uid), Some(value)) = (entry.get("uid"), entry.get("value")) else {
                tracing::debug!(%entry, "skipping value entry without uid/value");
                continue;
            };

            let uid_text = scalar_text(uid);
            let feature = parse_uid(&uid_text).and_then(|uid| self.lookup(uid));

            let (name, decoded) = match feature {
                Some(feature) => {
                    let decoded = feature
                        .label_for(&scalar_text(value))
                        .map_or_else(|| value.clone(), |label| Value::String(label.to_string()));
                    (feature.short_name().to_string(), decoded)
                },
                None => (feature::short_name(&uid_text).to_string(), value.clone()),
            };

            report.insert(name, decoded);
        }

        report
    }
}

/// Parse a catalog key: decimal, or hex with a `0x` prefix.
pub fn parse_uid(key: &str) -> Option<u32> {
    let key = key.trim();
    match key.strip_prefix("0x").or_else(|| key.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => key.parse().ok(),
    }
}

fn parse_features(features: Map<String, Value>) -> Result<Vec<FeatureDescriptor>> {
    features
        .into_iter()
        .map(|(key, value)| {
            let uid = parse_uid(&key)
                .ok_or_else(|| HcError::Catalog(format!("invalid feature uid {key:?}")))?;
            let mut feature: FeatureDescriptor = serde_json::from_value(value)
                .map_err(|e| HcError::Catalog(format!("feature {key}: {e}")))?;
            feature.uid = uid;
            Ok(feature)
        })
        .collect()
}

/// Text form of a scalar as used for catalog keys: strings unquoted.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOOR_CATALOG: &str = r#"{
        "558": {"name": "BSH.Common.Status.DoorState", "values": {"1": "Open", "2": "Closed"}}
    }"#;

    #[test]
    fn test_decode_door_state() {
        let catalog = FeatureCatalog::from_json(DOOR_CATALOG).unwrap();
        let report = catalog.decode_values(&[json!({"uid": "558", "value": 2})]);
        assert_eq!(report.get("DoorState"), Some(&json!("Closed")));
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn test_decode_numeric_uid_and_unknowns() {
        let catalog = FeatureCatalog::from_json(DOOR_CATALOG).unwrap();
        let report = catalog.decode_values(&[
            json!({"uid": 558, "value": 1}),
            json!({"uid": 12345, "value": 7}),
            json!({"uid": 558}),
        ]);
        assert_eq!(report.get("DoorState"), Some(&json!("Open")));
        assert_eq!(report.get("12345"), Some(&json!(7)));
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn test_decode_value_without_label_kept() {
        let catalog = FeatureCatalog::from_json(DOOR_CATALOG).unwrap();
        let report = catalog.decode_values(&[json!({"uid": 558, "value": 9})]);
        assert_eq!(report.get("DoorState"), Some(&json!(9)));
    }

    #[test]
    fn test_converter_output_with_description() {
        let catalog = FeatureCatalog::from_json(
            r#"{
                "description": {"brand": "BOSCH", "model": "SMV68", "type": null},
                "features": {
                    "0x022e": {"name": "BSH.Common.Status.DoorState", "access": "read"},
                    "5": {"name": "BSH.Common.Root.SelectedProgram"}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.lookup(558).unwrap().access, Some(Access::Read));
        assert!(catalog.lookup(5).is_some());
        assert_eq!(catalog.description().get("brand").map(String::as_str), Some("BOSCH"));
        assert!(!catalog.description().contains_key("type"));
    }

    #[test]
    fn test_invalid_catalogs() {
        assert!(FeatureCatalog::from_json("[]").is_err());
        assert!(FeatureCatalog::from_json(r#"{"features": 3}"#).is_err());
        assert!(FeatureCatalog::from_json(r#"{"abc": {"name": "X"}}"#).is_err());
        assert!(FeatureCatalog::from_json(r#"{"1": {"access": "read"}}"#).is_err());
    }

    #[test]
    fn test_parse_uid() {
        assert_eq!(parse_uid("558"), Some(558));
        assert_eq!(parse_uid("0x022E"), Some(558));
        assert_eq!(parse_uid("zz"), None);
    }
}
