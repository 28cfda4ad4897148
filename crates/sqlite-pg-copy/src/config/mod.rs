//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Build a configuration from a source path and destination URI, with
    /// default copy settings.
    pub fn new(source_path: impl Into<String>, target_uri: impl Into<String>) -> Self {
        Self {
            source: SourceConfig {
                path: source_path.into(),
            },
            target: TargetConfig {
                uri: target_uri.into(),
                ssl_mode: None,
                schema: "public".to_string(),
            },
            copy: CopyConfig::default(),
        }
    }

    /// Load configuration from a YAML file without validating it, so that
    /// command-line overrides can be applied first.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}
