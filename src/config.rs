//! Configuration management for the Kiln engine

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use crate::error::{KilnError, KilnResult};

/// Knobs read by evaluation plans when they flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Assert that every input of an item is populated before its kernel runs.
    pub verify_inputs: bool,
    /// Emit a trace event per executed item.
    pub trace_items: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            verify_inputs: cfg!(debug_assertions),
            trace_items: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevelopmentConfig {
    pub verbose_logging: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KilnConfig {
    pub evaluation: EvalConfig,
    pub development: DevelopmentConfig,
}

/// Owns one configuration and the file it persists to, if any.
pub struct ConfigManager {
    config: Arc<RwLock<KilnConfig>>,
    config_file: Option<PathBuf>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(KilnConfig::default())),
            config_file: None,
        }
    }

    pub fn with_config_file(mut self, path: PathBuf) -> Self {
        self.config_file = Some(path);
        self
    }

    pub fn load_from_file(&mut self, path: &Path) -> KilnResult<()> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KilnError::ConfigurationError(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        let config: KilnConfig = serde_json::from_str(&content).map_err(|e| {
            KilnError::ConfigurationError(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        *self.config.write() = config;
        self.config_file = Some(path.to_path_buf());
        tracing::info!("Configuration loaded from {:?}", path);
        Ok(())
    }

    pub fn save_to_file(&self, path: &Path) -> KilnResult<()> {
        let content = serde_json::to_string_pretty(&*self.config.read())?;
        std::fs::write(path, content)?;
        tracing::info!("Configuration saved to {:?}", path);
        Ok(())
    }

    pub fn get_config(&self) -> KilnConfig {
        self.config.read().clone()
    }

    /// Apply `f` and write the result back to the configured file, if any.
    pub fn update_config<F>(&mut self, f: F) -> KilnResult<()>
    where
        F: FnOnce(&mut KilnConfig),
    {
        f(&mut self.config.write());
        if let Some(ref path) = self.config_file {
            self.save_to_file(path)?;
        }
        Ok(())
    }

    pub fn set_config(&mut self, config: KilnConfig) -> KilnResult<()> {
        self.update_config(|current| *current = config)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    static ref CONFIG_MANAGER: RwLock<ConfigManager> = RwLock::new(ConfigManager::new());
}

/// Get the global configuration
pub fn get_config() -> KilnConfig {
    CONFIG_MANAGER.read().get_config()
}

/// Update the global configuration
pub fn update_config<F>(f: F) -> KilnResult<()>
where
    F: FnOnce(&mut KilnConfig),
{
    CONFIG_MANAGER.write().update_config(f)
}

/// Replace the global configuration with the contents of `path`
pub fn load_config_from_file(path: &Path) -> KilnResult<()> {
    CONFIG_MANAGER.write().load_from_file(path)
}

pub struct ConfigBuilder {
    config: KilnConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: KilnConfig::default(),
        }
    }

    pub fn evaluation(mut self, f: impl FnOnce(&mut EvalConfig)) -> Self {
        f(&mut self.config.evaluation);
        self
    }

    pub fn development(mut self, f: impl FnOnce(&mut DevelopmentConfig)) -> Self {
        f(&mut self.config.development);
        self
    }

    pub fn build(self) -> KilnConfig {
        self.config
    }

    /// Install the built configuration globally.
    pub fn apply(self) -> KilnResult<()> {
        update_config(|config| *config = self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
