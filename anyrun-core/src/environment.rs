//! Process environment read once at startup

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::plugins::{ConfigError, PLUGIN_PATH_VAR, PluginPath};

/// Icon-loader cache file consumed by the rendering layer
pub const PIXBUF_MODULE_FILE_VAR: &str = "GDK_PIXBUF_MODULE_FILE";

/// Snapshot of the environment variables set by the launcher's wrapper.
///
/// Captured once; the core never writes these variables back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupEnvironment {
    plugin_path: Option<OsString>,
    pixbuf_module_file: Option<PathBuf>,
}

impl StartupEnvironment {
    /// Read the variables from the current process environment
    pub fn capture() -> Self {
        let env = Self::from_values(
            std::env::var_os(PLUGIN_PATH_VAR),
            std::env::var_os(PIXBUF_MODULE_FILE_VAR).map(PathBuf::from),
        );

        match &env.pixbuf_module_file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Icon loader cache provided");
            }
            None => {
                tracing::warn!(
                    var = PIXBUF_MODULE_FILE_VAR,
                    "Icon loader cache not set, icons may fail to render"
                );
            }
        }

        env
    }

    pub fn from_values(plugin_path: Option<OsString>, pixbuf_module_file: Option<PathBuf>) -> Self {
        Self {
            plugin_path,
            pixbuf_module_file,
        }
    }

    /// Raw value of `ANYRUN_PLUGINS`, if it was set
    pub fn raw_plugin_path(&self) -> Option<&OsStr> {
        self.plugin_path.as_deref()
    }

    pub fn pixbuf_module_file(&self) -> Option<&Path> {
        self.pixbuf_module_file.as_deref()
    }

    /// Resolve the plugin search path, using `fallback` only when
    /// `ANYRUN_PLUGINS` is absent
    pub fn plugin_path(&self, fallback: Option<&Path>) -> Result<PluginPath, ConfigError> {
        PluginPath::from_env_value(self.raw_plugin_path(), fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_capture_reads_both_variables() {
        unsafe {
            std::env::set_var(PLUGIN_PATH_VAR, "/nix/store/x/lib:/etc/anyrun");
            std::env::set_var(PIXBUF_MODULE_FILE_VAR, "/nix/store/y/loaders.cache");
        }

        let env = StartupEnvironment::capture();
        assert_eq!(
            env.raw_plugin_path(),
            Some(OsStr::new("/nix/store/x/lib:/etc/anyrun"))
        );
        assert_eq!(
            env.pixbuf_module_file(),
            Some(Path::new("/nix/store/y/loaders.cache"))
        );

        unsafe {
            std::env::remove_var(PLUGIN_PATH_VAR);
            std::env::remove_var(PIXBUF_MODULE_FILE_VAR);
        }
    }

    #[test]
    #[serial]
    fn test_capture_does_not_modify_environment() {
        unsafe {
            std::env::set_var(PIXBUF_MODULE_FILE_VAR, "/cache/loaders.cache");
            std::env::remove_var(PLUGIN_PATH_VAR);
        }

        let _env = StartupEnvironment::capture();
        assert_eq!(
            std::env::var_os(PIXBUF_MODULE_FILE_VAR),
            Some(OsString::from("/cache/loaders.cache"))
        );
        assert!(std::env::var_os(PLUGIN_PATH_VAR).is_none());

        unsafe {
            std::env::remove_var(PIXBUF_MODULE_FILE_VAR);
        }
    }

    #[test]
    fn test_plugin_path_from_captured_value() {
        let env = StartupEnvironment::from_values(Some(OsString::from("/a::/b")), None);
        let path = env.plugin_path(None).unwrap();
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn test_absent_variable_without_fallback_is_config_error() {
        let env = StartupEnvironment::default();
        assert!(env.plugin_path(None).is_err());
        assert!(env.plugin_path(Some(Path::new("/usr/lib/anyrun"))).is_ok());
    }
}
