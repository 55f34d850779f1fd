//! Orchestrator configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the orchestrator.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct OrchestratorConfig {
    /// Delay before the progress surface is shown for a lone job.
    #[builder(default = "750")]
    #[serde(default = "default_show_delay_ms")]
    pub show_delay_ms: u64,

    /// Run the volume handler for hot-plugged devices.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub volume_management: bool,

    /// Handler command; the device id is appended as the last argument.
    #[builder(default = "default_volume_handler()")]
    #[serde(default = "default_volume_handler")]
    pub volume_handler: Vec<String>,

    /// Keep running after the last window closed.
    #[builder(default = "false")]
    #[serde(default)]
    pub daemon: bool,
}

fn default_true() -> bool {
    true
}

fn default_show_delay_ms() -> u64 {
    750
}

fn default_volume_handler() -> Vec<String> {
    vec!["volman".to_string(), "--device-added".to_string()]
}

impl OrchestratorConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref handler) = self.volume_handler {
            if handler.first().is_none_or(|program| program.is_empty()) {
                return Err("Volume handler command cannot be empty".to_string());
            }
        }
        Ok(())
    }
}

impl OrchestratorConfig {
    /// Create a new config builder.
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }

    /// The show delay as a duration.
    pub fn show_delay(&self) -> Duration {
        Duration::from_millis(self.show_delay_ms)
    }

    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("conveyor")
            .join("config.toml")
    }

    /// Load the configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.check()?;
        Ok(config)
    }

    /// Load the default file if it exists, otherwise use defaults.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.volume_handler.first().is_none_or(|p| p.is_empty()) {
            return Err(ConfigError::Invalid {
                message: "volume_handler cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            show_delay_ms: default_show_delay_ms(),
            volume_management: true,
            volume_handler: default_volume_handler(),
            daemon: false,
        }
    }
}
