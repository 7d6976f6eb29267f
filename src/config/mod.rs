//! Configuration management module for the synchronization engine.
//!
//! Provides layered settings loading with priority:
//! 1. Default values (hardcoded)
//! 2. Optional settings file
//! 3. Environment variables (highest priority)
//!

mod network;
mod retry;
mod storage;
mod sync;
pub use network::*;
pub use retry::*;
pub use storage::*;
pub use sync::*;


//---
use crate::{Error, Result};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// Application identity and polling parameters
    #[serde(default)]
    pub sync: SyncConfig,
    /// Network communication parameters
    #[serde(default)]
    pub network: NetworkConfig,
    /// Disk fallback and logging paths
    #[serde(default)]
    pub storage: StorageConfig,
    /// Retry policies for remote operations
    #[serde(default)]
    pub retry: RetryPolicies,
}

impl Settings {
    /// Load configuration from multiple sources with priority:
    /// 1. Settings file (explicit path, or `config/confsync.*` when present)
    /// 2. Environment variables
    ///
    /// # Arguments
    /// * `path` - Optional path to a settings file; required when given
    ///
    /// # Returns
    /// Merged and validated configuration
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        match path {
            Some(p) => {
                config = config.add_source(File::with_name(p).required(true));
            }
            None => {
                config = config.add_source(File::with_name("config/confsync").required(false));
            }
        }

        // Environment variables (highest priority)
        config = config.add_source(
            Environment::with_prefix("CONFSYNC")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync.app_id.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "sync.app_id must not be empty".to_string(),
            )));
        }
        if self.sync.config_server_url.is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "sync.config_server_url must not be empty".to_string(),
            )));
        }
        Ok(())
    }
}
