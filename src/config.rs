// src/config.rs
//! Configuration management

use crate::{
    error::{GgaError, Result},
    link::{Endpoint, LinkSettings},
};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5555;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub host: String,
    pub port: u16,
    pub read_timeout_ms: u64,
    pub retry_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let settings = LinkSettings::default();
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            read_timeout_ms: settings.read_timeout.as_millis() as u64,
            retry_interval_ms: settings.retry_interval.as_millis() as u64,
        }
    }
}

impl MonitorConfig {
    /// Load from the per-user config file, defaults if there is none
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    /// Save to the per-user config file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(config_path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;

        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        self.validate()?;

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, contents)?;

        Ok(())
    }

    /// `$HOME/.config/gga-monitor/config.json`
    pub fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| GgaError::Config("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home).join(".config").join("gga-monitor").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(GgaError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(GgaError::Config("port must not be 0".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(GgaError::Config("read_timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Update receiver address
    pub fn update_endpoint(&mut self, host: String, port: u16) {
        self.host = host;
        self.port = port;
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.host.clone(), self.port)
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            retry_interval: Duration::from_millis(self.retry_interval_ms),
        }
    }
}
