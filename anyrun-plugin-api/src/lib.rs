//! anyrun-plugin-api - Plugin API for the anyrun launcher
//!
//! This crate provides the traits and types needed to write anyrun plugins.
//! Plugins are native Rust dynamic libraries that answer queries typed into
//! the launcher and optionally run an action when one of their matches is
//! activated.
//!
//! # Example
//!
//! ```ignore
//! use anyrun_plugin_api::{Match, Plugin, PluginError, PluginManifest, export_plugin};
//!
//! #[derive(Default)]
//! pub struct Echo;
//!
//! impl Plugin for Echo {
//!     fn manifest(&self) -> PluginManifest {
//!         PluginManifest {
//!             name: "echo".to_string(),
//!             label: "Echo".to_string(),
//!             ..Default::default()
//!         }
//!     }
//!
//!     fn query(&self, input: &str) -> Result<Vec<Match>, PluginError> {
//!         Ok(vec![Match::new(input)])
//!     }
//! }
//!
//! export_plugin!(Echo);
//! ```

pub mod context;
pub mod error;
pub mod process;
pub mod types;

pub use context::{PluginConfig, PluginContext};
pub use error::PluginError;
pub use process::spawn_detached;
pub use types::*;

/// Current plugin API version. Plugins must match this exactly.
/// This is checked at bind time, before any plugin code other than the
/// version entry point runs.
pub const API_VERSION: u32 = 1;

/// Exported symbol returning the plugin's [`API_VERSION`].
pub const SYMBOL_API_VERSION: &[u8] = b"_anyrun_plugin_api_version";

/// Exported symbol creating a boxed plugin instance.
pub const SYMBOL_CREATE: &[u8] = b"_anyrun_plugin_create";

/// The capability contract every anyrun plugin implements.
///
/// `query` and `handle_action` take `&self` because the launcher dispatches
/// one query to many plugins at once, from worker threads.
pub trait Plugin: Send + Sync {
    /// Return plugin identity and display metadata
    fn manifest(&self) -> PluginManifest;

    /// Called once after the plugin's identity has been accepted and before
    /// it receives any query.
    fn init(&mut self, _ctx: &mut PluginContext) -> Result<(), PluginError> {
        Ok(())
    }

    /// Produce matches for the given input, best first.
    fn query(&self, input: &str) -> Result<Vec<Match>, PluginError>;

    /// Run the action behind a match this plugin produced earlier.
    fn handle_action(&self, action: u64) -> Result<ActionOutcome, PluginError> {
        Err(PluginError::Unsupported(format!("action {action}")))
    }

    /// Called when the plugin is dropped, before its library is released.
    fn on_unload(&mut self) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Export a plugin type for dynamic loading.
///
/// This macro generates the C ABI entry points that anyrun uses to bind
/// a plugin library.
///
/// # Usage
///
/// ```ignore
/// anyrun_plugin_api::export_plugin!(MyPlugin);
/// ```
///
/// # Generated Functions
///
/// - `_anyrun_plugin_api_version()`: Returns the API version
/// - `_anyrun_plugin_create()`: Creates a new plugin instance, or returns a
///   null pointer if the plugin's constructor panics
///
/// The host takes ownership of the returned box and drops it in-process, so
/// no destroy entry point is exported.
#[macro_export]
macro_rules! export_plugin {
    ($plugin_type:ty) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn _anyrun_plugin_create() -> *mut dyn $crate::Plugin {
            let created = ::std::panic::catch_unwind(|| {
                let plugin: Box<dyn $crate::Plugin> = Box::new(<$plugin_type>::default());
                plugin
            });
            match created {
                Ok(plugin) => Box::into_raw(plugin),
                // A panic must not unwind across the C ABI boundary.
                Err(_) => ::std::ptr::null_mut::<$plugin_type>() as *mut dyn $crate::Plugin,
            }
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _anyrun_plugin_api_version() -> u32 {
            $crate::API_VERSION
        }
    };
}
