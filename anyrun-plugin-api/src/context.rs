//! PluginContext - what the launcher hands a plugin during `init`

use crate::error::PluginError;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Plugin's view of the launcher while it initializes.
///
/// Provides:
/// - The plugin's accepted name
/// - The directory the plugin library was loaded from
/// - Plugin configuration (TOML key-value store)
/// - Logging utilities tagged with the plugin name
pub struct PluginContext {
    plugin_name: String,
    plugin_dir: PathBuf,
    config: PluginConfig,
}

/// Plugin configuration - read-only key-value store backed by TOML
#[derive(Debug, Clone, Default)]
pub struct PluginConfig {
    values: HashMap<String, toml::Value>,
}

impl PluginContext {
    /// Create a new plugin context with an empty config
    pub fn new(plugin_name: String, plugin_dir: PathBuf) -> Self {
        Self::with_config(plugin_name, plugin_dir, PluginConfig::new())
    }

    /// Create a context with a pre-loaded config
    pub fn with_config(plugin_name: String, plugin_dir: PathBuf, config: PluginConfig) -> Self {
        Self {
            plugin_name,
            plugin_dir,
            config,
        }
    }

    /// Directory the plugin library was loaded from
    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Read a configuration value
    pub fn config_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config.get(key)
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    // ─── Logging ─────────────────────────────────────────────────────

    /// Log an info message (automatically tagged with plugin name)
    pub fn log_info(&self, message: &str) {
        tracing::info!(plugin = %self.plugin_name, "{}", message);
    }

    pub fn log_warn(&self, message: &str) {
        tracing::warn!(plugin = %self.plugin_name, "{}", message);
    }

    pub fn log_error(&self, message: &str) {
        tracing::error!(plugin = %self.plugin_name, "{}", message);
    }

    pub fn log_debug(&self, message: &str) {
        tracing::debug!(plugin = %self.plugin_name, "{}", message);
    }
}

impl PluginConfig {
    /// Create a new empty config
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    ///
    /// A missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        std::fs::read_to_string(path)?.parse()
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values.get(key).and_then(|v| v.clone().try_into().ok())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl std::str::FromStr for PluginConfig {
    type Err = PluginError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let values = toml::from_str(content).map_err(|e| PluginError::Config(e.to_string()))?;
        Ok(Self { values })
    }
}
