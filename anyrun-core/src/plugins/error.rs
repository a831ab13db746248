//! Plugin system error types

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Startup configuration errors. These are fatal and reported to the operator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither `ANYRUN_PLUGINS` nor a fallback plugin directory is available
    #[error("{var} is not set and no fallback plugin directory is configured")]
    MissingPluginPath { var: &'static str },
}

/// Reasons a library could not be bound to the plugin contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    /// The dynamic library could not be opened
    #[error("Failed to open library: {0}")]
    Open(String),

    /// A required entry point is not exported
    #[error("Missing entry point {symbol}: {message}")]
    MissingSymbol { symbol: String, message: String },

    /// API version mismatch between anyrun and plugin
    #[error("API version mismatch: anyrun expects {expected}, plugin has {found}")]
    ApiVersionMismatch { expected: u32, found: u32 },
}

/// Loading stage in which plugin code panicked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Create,
    Identify,
    Init,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStage::Create => write!(f, "create"),
            LoadStage::Identify => write!(f, "identify"),
            LoadStage::Init => write!(f, "init"),
        }
    }
}

/// Per-plugin load errors. Never fatal to the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The library does not satisfy the plugin contract
    #[error("Incompatible plugin: {0}")]
    Incompatible(#[from] BindError),

    /// Another plugin with the same identity was loaded first
    #[error("Plugin '{name}' already loaded from {existing}")]
    DuplicateIdentity { name: String, existing: PathBuf },

    /// The plugin reported an empty name
    #[error("Plugin reported an empty name")]
    EmptyIdentity,

    /// Plugin code panicked while loading
    #[error("Plugin panicked during {stage}")]
    Panicked { stage: LoadStage },

    /// The plugin's init hook returned an error
    #[error("Plugin initialization failed: {0}")]
    InitFailed(String),
}

/// Per-plugin query errors. Downgraded to an empty contribution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The plugin returned an error
    #[error("Plugin query failed: {0}")]
    Plugin(String),

    /// The plugin panicked
    #[error("Plugin panicked during query")]
    Panicked,

    /// The plugin did not answer in time
    #[error("Plugin timed out after {timeout:?}")]
    TimedOut { timeout: Duration },

    /// The worker running the query was torn down before finishing
    #[error("Plugin query was interrupted")]
    Interrupted,

    /// The plugin's previous query is still running
    #[error("Plugin is still busy with an earlier query")]
    Busy,
}

/// An action token no longer resolves to a live plugin instance
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Action token for plugin '{plugin}' (instance {instance}) is stale")]
pub struct StaleHandleError {
    pub plugin: String,
    pub instance: u64,
}

/// Errors returned when running a match's action
#[derive(Error, Debug)]
pub enum ActionError {
    #[error(transparent)]
    Stale(#[from] StaleHandleError),

    /// The plugin rejected or failed the action
    #[error("Plugin '{plugin}' action failed: {source}")]
    Plugin {
        plugin: String,
        #[source]
        source: anyrun_plugin_api::PluginError,
    },

    /// The plugin panicked while running the action
    #[error("Plugin '{plugin}' panicked during action")]
    Panicked { plugin: String },
}

/// Errors from registry management
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginHostError {
    /// Plugin not found
    #[error("Plugin '{name}' not found")]
    NotFound { name: String },
}
