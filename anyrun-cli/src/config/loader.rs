use super::types::{AnyrunConfig, DEFAULT_HANDLER_TIMEOUT_MS, PluginsConfig, RawAnyrunConfig};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Overrides the location of config.toml
pub const CONFIG_PATH_VAR: &str = "ANYRUN_CONFIG";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load the user configuration, falling back to defaults when no file exists
    pub fn load() -> Result<AnyrunConfig> {
        Self::load_from(&Self::config_path())
    }

    /// `$ANYRUN_CONFIG`, else `<config dir>/config.toml`
    pub fn config_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| anyrun_paths::config_dir().join("config.toml"))
    }

    /// Load configuration from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<AnyrunConfig> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(AnyrunConfig::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw: RawAnyrunConfig = toml::from_str(&contents)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        let config = Self::finalize(raw);
        config
            .plugins
            .aggregator_config()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawAnyrunConfig) -> AnyrunConfig {
        let defaults = PluginsConfig::default();
        let plugins = raw.plugins;
        AnyrunConfig {
            plugins: PluginsConfig {
                fallback_dir: plugins.fallback_dir,
                handler_timeout_ms: plugins
                    .handler_timeout_ms
                    .unwrap_or(DEFAULT_HANDLER_TIMEOUT_MS),
                max_concurrency: plugins
                    .max_concurrency
                    .unwrap_or(defaults.max_concurrency),
                merge_policy: plugins.merge_policy.unwrap_or(defaults.merge_policy),
                routes: plugins
                    .routes
                    .into_iter()
                    .map(|(name, route)| (name, route.into()))
                    .collect(),
            },
        }
    }
}
