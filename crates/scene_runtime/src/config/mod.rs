//! Runtime configuration
//!
//! Small serde-backed configuration for collections, loadable from TOML or
//! RON with sensible defaults for every field.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration parse errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Malformed TOML input.
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed RON input.
    #[error("failed to parse RON config: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Tunables for one collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum number of live instances in a collection.
    pub max_instances: usize,

    /// Initial mailbox capacity, in messages.
    pub mailbox_capacity: usize,

    /// Log non-fatal component callback failures.
    pub log_component_failures: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_instances: 1024,
            mailbox_capacity: 256,
            log_component_failures: true,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] on malformed input.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Parse a configuration from RON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Ron`] on malformed input.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = RuntimeConfig::default();
        assert_eq!(config.max_instances, 1024);
        assert_eq!(config.mailbox_capacity, 256);
        assert!(config.log_component_failures);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = RuntimeConfig::from_toml_str("max_instances = 16\n").unwrap();
        assert_eq!(config.max_instances, 16);
        assert_eq!(config.mailbox_capacity, 256);
    }

    #[test]
    fn ron_overrides_defaults() {
        let config =
            RuntimeConfig::from_ron_str("(mailbox_capacity: 8, log_component_failures: false)")
                .unwrap();
        assert_eq!(config.mailbox_capacity, 8);
        assert!(!config.log_component_failures);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(matches!(
            RuntimeConfig::from_toml_str("max_instances = \"many\""),
            Err(ConfigError::Toml(_))
        ));
    }
}
