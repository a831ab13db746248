//! Plugin search path resolution

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// Environment variable holding the plugin search path
pub const PLUGIN_PATH_VAR: &str = "ANYRUN_PLUGINS";

/// A directory named in the plugin search path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRef {
    pub path: PathBuf,
    /// Whether the directory existed when the path was resolved
    pub exists: bool,
}

impl DirectoryRef {
    fn new(path: PathBuf) -> Self {
        let exists = path.is_dir();
        Self { path, exists }
    }
}

/// Ordered plugin search path. Earlier directories win name collisions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginPath {
    dirs: Vec<DirectoryRef>,
}

impl PluginPath {
    /// Split a platform path list (`:` on Unix) into directories, keeping
    /// input order and dropping empty segments.
    pub fn resolve(raw: impl AsRef<OsStr>) -> Self {
        let dirs = std::env::split_paths(raw.as_ref())
            .filter(|p| !p.as_os_str().is_empty())
            .map(DirectoryRef::new)
            .collect();
        Self { dirs }
    }

    /// Build the search path from the value of [`PLUGIN_PATH_VAR`].
    ///
    /// A present value is used as-is, even when empty. An absent value falls
    /// back to `fallback`; with no fallback this is a [`ConfigError`].
    pub fn from_env_value(
        value: Option<&OsStr>,
        fallback: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        match (value, fallback) {
            (Some(raw), _) => Ok(Self::resolve(raw)),
            (None, Some(dir)) => Ok(Self {
                dirs: vec![DirectoryRef::new(dir.to_path_buf())],
            }),
            (None, None) => Err(ConfigError::MissingPluginPath {
                var: PLUGIN_PATH_VAR,
            }),
        }
    }

    /// All directories in priority order, duplicates included
    pub fn dirs(&self) -> &[DirectoryRef] {
        &self.dirs
    }

    /// Directories in priority order, each path only at its first position
    pub fn unique_dirs(&self) -> impl Iterator<Item = &DirectoryRef> {
        let mut seen = HashSet::new();
        self.dirs.iter().filter(move |d| seen.insert(d.path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }
}
