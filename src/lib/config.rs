use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::round::Durations;

/// Engine configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Phase lengths in blocks. Defaults to the deployed values when absent.
    #[serde(default)]
    pub durations: Durations,
    /// Profit-proof service. Required by `fetch`, ignored otherwise.
    pub rpc: Option<RpcConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    pub url: String,
    /// Request timeout (e.g. "10s", "1m"). Parsed via humantime.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Errors from config loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl EngineConfig {
    /// Load and validate a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.durations;
        for (name, value) in [
            ("challenge", d.challenge),
            ("withdraw", d.withdraw),
            ("lock", d.lock),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "durations.{name} must be greater than zero"
                )));
            }
        }

        if let Some(rpc) = &self.rpc {
            if !(rpc.url.starts_with("http://") || rpc.url.starts_with("https://")) {
                return Err(ConfigError::Validation(format!(
                    "rpc.url must be an http(s) URL, got {:?}",
                    rpc.url
                )));
            }
            if rpc.timeout.is_zero() {
                return Err(ConfigError::Validation("rpc.timeout must be non-zero".into()));
            }
        }
        Ok(())
    }
}
