//! anyrun-core: Core library for the anyrun launcher
//!
//! This crate turns a plugin search path into a set of loaded plugins and
//! answers queries by fanning them out to every plugin:
//!
//! - **Startup environment** - [`StartupEnvironment`] captures `ANYRUN_PLUGINS`
//!   and the icon-loader cache variable once, at process start
//! - **Resolver** - [`PluginPath`] parses the colon-separated search path
//! - **Loader** - [`PluginLoader`] binds plugin libraries and records a
//!   [`LoadOutcome`] for every candidate
//! - **Registry** - [`Registry`] holds the loaded plugins in load order
//! - **Aggregator** - [`Aggregator`] dispatches one query to every plugin and
//!   merges the answers into an [`AggregatedResultSet`]
//! - **Session** - [`QuerySession`] supersedes in-flight passes as the user types
//!
//! # Quick Start
//!
//! ```no_run
//! use anyrun_core::{AggregatorConfig, PluginLoader, StartupEnvironment};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let env = StartupEnvironment::capture();
//! let loader = PluginLoader::new();
//! let (aggregator, report) = anyrun_core::plugins::start(&env, None, &loader, AggregatorConfig::default())?;
//!
//! println!("{} plugins loaded", report.loaded_count());
//! for m in aggregator.query("firefox").await.iter() {
//!     println!("[{}] {}", m.plugin, m.entry.title);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//!  ANYRUN_PLUGINS ──► PluginPath ──► PluginLoader ──► Registry ──► Aggregator
//!                     (resolve)      (bind, once)    (read-only)  (per query)
//! ```

pub mod environment;
pub mod plugins;

pub use environment::{PIXBUF_MODULE_FILE_VAR, StartupEnvironment};
pub use plugins::{
    ActionError, ActionToken, AggregatedMatch, AggregatedResultSet, Aggregator, AggregatorConfig,
    BindError, BoundPlugin, ConfigError, DirectoryRef, LibraryBinder, LoadError, LoadOutcome,
    LoadReport, LoadStage, LoadedPlugin, MergePolicy, PLUGIN_PATH_VAR, PendingPass, PluginBinder,
    PluginDescriptor, PluginHostError, PluginLoader, PluginPath, PluginRoute, QueryError,
    QueryScope, QuerySession, Registry, RoutingTable, SkippedDir, StaleHandleError,
};
