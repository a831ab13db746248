//! Plugin system for anyrun
//!
//! This module provides the infrastructure for loading plugins and querying them:
//!
//! - [`PluginPath`]: The ordered plugin search path
//! - [`PluginLoader`]: Binds plugin libraries and builds the [`Registry`]
//! - [`Aggregator`]: Dispatches queries and routes actions
//! - [`RoutingTable`]: Per-plugin regex routing and "open" entries
//! - [`QuerySession`]: Cancels superseded passes while the user types
//!
//! # Plugin Discovery
//!
//! Plugins are discovered from the directories listed in `ANYRUN_PLUGINS`,
//! highest priority first. Every file with the platform's dynamic-library
//! extension is a candidate. A plugin's identity is the name it reports, not
//! its file name; when two candidates report the same name the one found
//! first is kept.
//!
//! # Example
//!
//! ```ignore
//! use anyrun_core::plugins::{AggregatorConfig, PluginLoader, PluginPath, Aggregator};
//!
//! let loader = PluginLoader::new();
//! let (registry, report) = loader.load(&PluginPath::resolve("/a:/b"));
//! let aggregator = Aggregator::new(registry, AggregatorConfig::default());
//!
//! let results = aggregator.query("term").await;
//! ```

mod aggregator;
mod binder;
mod error;
mod loader;
mod path;
mod registry;
mod routing;
mod session;

use std::path::Path;

pub use aggregator::{
    ActionToken, AggregatedMatch, AggregatedResultSet, Aggregator, AggregatorConfig, MergePolicy,
    QueryScope,
};
pub use binder::{
    BoundPlugin, LibraryBinder, PluginBinder, has_library_extension, library_extensions,
};
pub use error::{
    ActionError, BindError, ConfigError, LoadError, LoadStage, PluginHostError, QueryError,
    StaleHandleError,
};
pub use loader::{LoadOutcome, LoadReport, PluginLoader, SkippedDir};
pub use path::{DirectoryRef, PLUGIN_PATH_VAR, PluginPath};
pub use registry::{LoadedPlugin, PluginDescriptor, Registry};
pub use routing::{PluginRoute, RoutingTable};
pub use session::{PendingPass, QuerySession};

use crate::environment::StartupEnvironment;

/// Resolve the search path, load every plugin on it and build the aggregator.
///
/// Only a missing search path fails; per-plugin problems end up in the
/// returned [`LoadReport`].
pub fn start<B: PluginBinder>(
    env: &StartupEnvironment,
    fallback_dir: Option<&Path>,
    loader: &PluginLoader<B>,
    config: AggregatorConfig,
) -> Result<(Aggregator, LoadReport), ConfigError> {
    let path = env.plugin_path(fallback_dir)?;
    tracing::debug!(dirs = path.len(), "Plugin search path resolved");

    let (registry, report) = loader.load(&path);
    tracing::info!(
        loaded = registry.len(),
        rejected = report.rejected().count(),
        "Plugin loading finished"
    );

    Ok((Aggregator::new(registry, config), report))
}
