//! Exporter configuration.
//!
//! Devices are listed in a YAML file:
//!
//! ```yaml
//! devices:
//!   - name: edge-1
//!     address: 192.0.2.1
//!   - name: core-1
//!     address: 192.0.2.10
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(String),
    /// The file is not valid YAML or has unknown fields.
    Parse(String),
    /// The file parsed but describes an unusable setup.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Identity of a polled device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Device {
    /// Name used as the `name`/`device` label.
    pub name: String,
    /// Address used as the `address` label and for connecting.
    pub address: String,
}

impl Device {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub devices: Vec<Device>,
}

impl Config {
    /// Loads and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::Invalid("no devices configured".to_string()));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(ConfigError::Invalid("device with empty name".to_string()));
            }
            if device.address.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "device {} has no address",
                    device.name
                )));
            }
            if !seen.insert(device.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate device name {}",
                    device.name
                )));
            }
        }

        Ok(())
    }
}
