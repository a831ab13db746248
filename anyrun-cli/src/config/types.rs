use anyhow::{Context, Result};
use anyrun_core::{AggregatorConfig, MergePolicy, PluginRoute, RoutingTable};
use clap::{Args, ValueEnum};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-plugin query timeout
pub const DEFAULT_HANDLER_TIMEOUT_MS: u64 = 5_000;

/// Configuration as stored in TOML (every field optional)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawAnyrunConfig {
    #[serde(default)]
    pub plugins: RawPluginsConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawPluginsConfig {
    /// Used only when ANYRUN_PLUGINS is not set
    pub fallback_dir: Option<PathBuf>,
    pub handler_timeout_ms: Option<u64>,
    pub max_concurrency: Option<usize>,
    pub merge_policy: Option<MergePolicy>,
    /// `[plugins.routes.<plugin name>]`
    #[serde(default)]
    pub routes: BTreeMap<String, RawRouteConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawRouteConfig {
    pub default: Option<bool>,
    pub regex: Option<String>,
    pub replace: Option<bool>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnyrunConfig {
    pub plugins: PluginsConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PluginsConfig {
    pub fallback_dir: Option<PathBuf>,
    pub handler_timeout_ms: u64,
    pub max_concurrency: usize,
    pub merge_policy: MergePolicy,
    pub routes: BTreeMap<String, RouteConfig>,
}

/// Routing settings of one plugin, regex still uncompiled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    pub default: bool,
    pub regex: Option<String>,
    pub replace: bool,
}

impl Default for RouteConfig {
    fn default() -> Self {
        let route = PluginRoute::default();
        Self {
            default: route.default,
            regex: None,
            replace: route.replace,
        }
    }
}

impl From<RawRouteConfig> for RouteConfig {
    fn from(raw: RawRouteConfig) -> Self {
        let defaults = Self::default();
        Self {
            default: raw.default.unwrap_or(defaults.default),
            regex: raw.regex,
            replace: raw.replace.unwrap_or(defaults.replace),
        }
    }
}

impl Default for PluginsConfig {
    fn default() -> Self {
        let aggregator = AggregatorConfig::default();
        Self {
            fallback_dir: None,
            handler_timeout_ms: DEFAULT_HANDLER_TIMEOUT_MS,
            max_concurrency: aggregator.max_concurrency,
            merge_policy: aggregator.merge_policy,
            routes: BTreeMap::new(),
        }
    }
}

impl PluginsConfig {
    /// Build the aggregator settings, compiling every route regex
    pub fn aggregator_config(&self) -> Result<AggregatorConfig> {
        let mut routes = RoutingTable::default();
        for (plugin, route) in &self.routes {
            let regex = route
                .regex
                .as_deref()
                .map(Regex::new)
                .transpose()
                .with_context(|| format!("Invalid regex for plugin '{plugin}'"))?;
            routes.insert(
                plugin.clone(),
                PluginRoute {
                    default: route.default,
                    regex,
                    replace: route.replace,
                },
            );
        }

        Ok(AggregatorConfig {
            handler_timeout: Duration::from_millis(self.handler_timeout_ms),
            max_concurrency: self.max_concurrency.max(1),
            merge_policy: self.merge_policy,
            routes,
        })
    }
}

impl AnyrunConfig {
    /// Apply command-line overrides on top of the file configuration
    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(ms) = overrides.timeout_ms {
            self.plugins.handler_timeout_ms = ms;
        }
        if let Some(merge) = overrides.merge {
            self.plugins.merge_policy = merge.into();
        }
        self
    }
}

/// Flags that take precedence over config.toml
#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Per-plugin query timeout in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// How matches from different plugins are combined
    #[arg(long, global = true, value_enum)]
    pub merge: Option<MergeArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeArg {
    /// Group matches by plugin, in load order
    Grouped,
    /// Order all matches by descending score
    Score,
}

impl From<MergeArg> for MergePolicy {
    fn from(arg: MergeArg) -> Self {
        match arg {
            MergeArg::Grouped => MergePolicy::Grouped,
            MergeArg::Score => MergePolicy::Score,
        }
    }
}
