//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`HCLINK_*`), applied on top of a file
//!
//! ```toml
//! catalog = "dishwasher.json"
//!
//! [device]
//! name = "dishwasher"
//! host = "192.168.1.40"
//! key = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8"
//! iv = "EBESExQVFhcYGRobHB0eHw"
//!
//! [identity]
//! deviceName = "hcpy"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::FeatureCatalog;
use crate::crypto::{ChannelIv, ChannelRole, PreSharedKey, SecureChannel};
use crate::error::{HcError, Result};
use crate::protocol::DeviceIdentity;
use crate::transport::TransportKind;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Appliance to talk to
    #[serde(default)]
    pub device: DeviceConfig,

    /// Identity announced in the handshake
    #[serde(default)]
    pub identity: DeviceIdentity,

    /// Feature catalog file produced from the appliance's description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| HcError::Config(format!("Failed to read config file: {e}")))?;

        let mut config: Self = toml::from_str(&content)?;

        // relative catalog paths are resolved next to the config file
        if let (Some(catalog), Some(dir)) = (&config.catalog, path.parent()) {
            if catalog.is_relative() {
                config.catalog = Some(dir.join(catalog));
            }
        }
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Override fields from `HCLINK_*` environment variables.
    pub fn with_env(self) -> Self {
        self.with_vars(|name| std::env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(host) = var("HCLINK_HOST") {
            self.device.host = host;
        }
        if let Some(key) = var("HCLINK_KEY") {
            self.device.key = key;
        }
        if let Some(iv) = var("HCLINK_IV") {
            self.device.iv = (!iv.is_empty()).then_some(iv);
        }
        if let Some(name) = var("HCLINK_DEVICE_NAME") {
            self.identity.device_name = name;
        }
        if let Some(id) = var("HCLINK_DEVICE_ID") {
            self.identity.device_id = id;
        }
        if let Some(catalog) = var("HCLINK_CATALOG") {
            self.catalog = Some(PathBuf::from(catalog));
        }
        self
    }

    /// Check that everything needed to connect is present and decodes.
    pub fn validate(&self) -> Result<()> {
        if self.device.host.is_empty() {
            return Err(HcError::Config("device.host is required".to_string()));
        }
        self.device.psk()?;
        self.device.iv()?;
        Ok(())
    }

    /// Load the configured catalog, or an empty one when none is set.
    pub fn load_catalog(&self) -> Result<Arc<FeatureCatalog>> {
        match &self.catalog {
            Some(path) => Ok(Arc::new(FeatureCatalog::from_file(path)?)),
            None => {
                tracing::warn!("no feature catalog configured, writes will be rejected");
                Ok(Arc::new(FeatureCatalog::default()))
            },
        }
    }
}

/// Appliance connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Label used in logs
    #[serde(default)]
    pub name: String,

    /// Hostname or IP address
    #[serde(default)]
    pub host: String,

    /// Pre-shared key, base64url
    #[serde(default)]
    pub key: String,

    /// Channel IV, base64url; absent for TLS appliances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
}

impl DeviceConfig {
    /// Transport security this appliance uses
    pub fn transport_kind(&self) -> TransportKind {
        TransportKind::for_iv(self.iv.is_some())
    }

    /// Websocket URL of the appliance
    pub fn endpoint(&self) -> String {
        self.transport_kind().endpoint(&self.host)
    }

    /// Decode the pre-shared key
    pub fn psk(&self) -> Result<PreSharedKey> {
        PreSharedKey::from_base64url(&self.key)
            .map_err(|e| HcError::Config(format!("device.key: {e}")))
    }

    /// Decode the IV, if configured
    pub fn iv(&self) -> Result<Option<ChannelIv>> {
        self.iv
            .as_deref()
            .map(ChannelIv::from_base64url)
            .transpose()
            .map_err(|e| HcError::Config(format!("device.iv: {e}")))
    }

    /// Build the channel matching this appliance's transport.
    pub fn open_channel(&self, role: ChannelRole) -> Result<SecureChannel> {
        let channel = SecureChannel::new(&self.psk()?, self.iv()?, role)?;
        tracing::debug!(
            device = %self.name,
            transport = %self.transport_kind(),
            "channel ready"
        );
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KEY: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";
    const IV: &str = "EBESExQVFhcYGRobHB0eHw";

    fn device(iv: Option<&str>) -> DeviceConfig {
        DeviceConfig {
            name: "oven".to_string(),
            host: "10.0.0.7".to_string(),
            key: KEY.to_string(),
            iv: iv.map(str::to_string),
        }
    }

    #[test]
    fn test_endpoint_selection() {
        assert_eq!(device(Some(IV)).endpoint(), "ws://10.0.0.7:80/homeconnect");
        assert_eq!(device(None).endpoint(), "wss://10.0.0.7:443/homeconnect");
    }

    #[test]
    fn test_open_channel() {
        let channel = device(Some(IV)).open_channel(ChannelRole::Application).unwrap();
        assert!(channel.is_self_encrypted());
        let channel = device(None).open_channel(ChannelRole::Application).unwrap();
        assert!(!channel.is_self_encrypted());
    }

    #[test]
    fn test_padded_base64_accepted() {
        let mut device = device(Some("EBESExQVFhcYGRobHB0eHw=="));
        device.key.push('=');
        assert_eq!(device.iv().unwrap().unwrap().as_bytes()[0], 0x10);
        assert_eq!(device.psk().unwrap().as_bytes().len(), 32);
    }

    #[test]
    fn test_bad_iv_is_config_error() {
        let device = device(Some("AAEC"));
        assert!(matches!(device.iv(), Err(HcError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hclink.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
catalog = "oven.json"

[device]
name = "oven"
host = "10.0.0.7"
key = "{KEY}"
iv = "{IV}"

[identity]
deviceName = "kitchen"
"#
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.device.host, "10.0.0.7");
        assert_eq!(config.identity.device_name, "kitchen");
        assert_eq!(config.identity.device_type, "Application");
        assert_eq!(config.identity.device_id, "0badcafe");
        assert_eq!(config.catalog, Some(dir.path().join("oven.json")));
        config.validate().unwrap();
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[device\nhost = 1").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, HcError::Config(_)));
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_load_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oven.json");
        std::fs::write(&path, r#"{"558": {"name": "BSH.Common.Status.DoorState"}}"#).unwrap();

        let config = Config {
            catalog: Some(path),
            ..Config::default()
        };
        assert_eq!(config.load_catalog().unwrap().len(), 1);
        assert!(Config::default().load_catalog().unwrap().is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default().with_vars(|name| match name {
            "HCLINK_HOST" => Some("dishwasher.local".to_string()),
            "HCLINK_KEY" => Some(KEY.to_string()),
            "HCLINK_IV" => Some(String::new()),
            "HCLINK_DEVICE_ID" => Some("cafe".to_string()),
            _ => None,
        });
        assert_eq!(config.device.host, "dishwasher.local");
        assert_eq!(config.device.iv, None);
        assert_eq!(config.identity.device_id, "cafe");
        assert_eq!(config.device.transport_kind(), TransportKind::Tls);
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_host_rejected() {
        assert!(matches!(
            Config::default().validate(),
            Err(HcError::Config(_))
        ));
    }
}
