//! PluginLoader - discovers plugin libraries and builds the registry

use anyrun_plugin_api::{API_VERSION, PluginConfig, PluginContext};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use super::binder::{LibraryBinder, PluginBinder};
use super::error::{BindError, LoadError, LoadStage};
use super::path::{DirectoryRef, PluginPath};
use super::registry::{LoadedPlugin, PluginDescriptor, Registry};

/// Result of trying to load one candidate file
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The plugin is in the registry
    Loaded {
        path: PathBuf,
        descriptor: PluginDescriptor,
    },
    /// The file does not satisfy the plugin contract
    Incompatible { path: PathBuf, reason: BindError },
    /// The plugin bound but could not be admitted
    Failed { path: PathBuf, cause: LoadError },
}

impl LoadOutcome {
    pub fn path(&self) -> &Path {
        match self {
            LoadOutcome::Loaded { path, .. }
            | LoadOutcome::Incompatible { path, .. }
            | LoadOutcome::Failed { path, .. } => path,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded { .. })
    }
}

/// A search path directory that was not scanned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDir {
    pub path: PathBuf,
    pub reason: String,
}

/// Diagnostics from one loading phase
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// One entry per candidate file, in visit order
    pub outcomes: Vec<LoadOutcome>,
    pub skipped_dirs: Vec<SkippedDir>,
}

impl LoadReport {
    pub fn loaded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_loaded()).count()
    }

    /// Outcomes that did not end in the registry
    pub fn rejected(&self) -> impl Iterator<Item = &LoadOutcome> {
        self.outcomes.iter().filter(|o| !o.is_loaded())
    }
}

/// Loads every plugin on a [`PluginPath`] through a [`PluginBinder`]
pub struct PluginLoader<B = LibraryBinder> {
    binder: B,
    /// Directory holding `<plugin name>.toml` config files
    config_dir: PathBuf,
}

impl PluginLoader<LibraryBinder> {
    /// Loader for native plugin libraries, reading plugin config from
    /// [`anyrun_paths::plugin_config_dir`]
    pub fn new() -> Self {
        Self::with_binder(LibraryBinder)
    }
}

impl Default for PluginLoader<LibraryBinder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: PluginBinder> PluginLoader<B> {
    pub fn with_binder(binder: B) -> Self {
        Self {
            binder,
            config_dir: anyrun_paths::plugin_config_dir(),
        }
    }

    /// Read plugin config files from `dir` instead of the user config directory
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    /// Load all plugins on the path, highest priority directory first.
    ///
    /// Never fails as a whole: every problem is confined to the candidate or
    /// directory it concerns and recorded in the [`LoadReport`].
    pub fn load(&self, path: &PluginPath) -> (Registry, LoadReport) {
        let mut registry = Registry::default();
        let mut report = LoadReport::default();

        if path.unique_dirs().count() < path.len() {
            tracing::debug!("Plugin path lists a directory more than once, later entries ignored");
        }

        for dir in path.unique_dirs() {
            let candidates = match self.candidates(dir) {
                Ok(candidates) => candidates,
                Err(reason) => {
                    tracing::warn!(dir = %dir.path.display(), %reason, "Skipping plugin directory");
                    report.skipped_dirs.push(SkippedDir {
                        path: dir.path.clone(),
                        reason,
                    });
                    continue;
                }
            };

            for candidate in candidates {
                let outcome = match self.load_candidate(&candidate, &dir.path, &registry) {
                    Ok(plugin) => {
                        let descriptor = plugin.descriptor().clone();
                        tracing::info!(
                            plugin = %descriptor.name,
                            version = %descriptor.version,
                            path = %candidate.display(),
                            "Plugin loaded"
                        );
                        registry.insert(plugin);
                        LoadOutcome::Loaded {
                            path: candidate,
                            descriptor,
                        }
                    }
                    Err(LoadError::Incompatible(reason)) => {
                        tracing::warn!(path = %candidate.display(), error = %reason, "Incompatible plugin");
                        LoadOutcome::Incompatible {
                            path: candidate,
                            reason,
                        }
                    }
                    Err(cause) => {
                        tracing::error!(path = %candidate.display(), error = %cause, "Failed to load plugin");
                        LoadOutcome::Failed {
                            path: candidate,
                            cause,
                        }
                    }
                };
                report.outcomes.push(outcome);
            }
        }

        (registry, report)
    }

    /// Candidate files of one directory, sorted by file name
    fn candidates(&self, dir: &DirectoryRef) -> Result<Vec<PathBuf>, String> {
        if !dir.exists {
            return Err("directory does not exist".to_string());
        }

        let entries = std::fs::read_dir(&dir.path).map_err(|e| e.to_string())?;
        let mut found = Vec::new();
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    tracing::debug!(dir = %dir.path.display(), error = %e, "Unreadable directory entry");
                    continue;
                }
            };
            if path.is_file() && self.binder.is_candidate(&path) {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }

    /// Bind, identify and initialize a single candidate
    fn load_candidate(
        &self,
        path: &Path,
        dir: &Path,
        registry: &Registry,
    ) -> Result<LoadedPlugin, LoadError> {
        let mut bound = self.binder.bind(path)?;

        let mut manifest = std::panic::catch_unwind(AssertUnwindSafe(|| bound.instance.manifest()))
            .map_err(|_| LoadError::Panicked {
                stage: LoadStage::Identify,
            })?;

        if manifest.api_version != API_VERSION {
            return Err(BindError::ApiVersionMismatch {
                expected: API_VERSION,
                found: manifest.api_version,
            }
            .into());
        }

        manifest.name = manifest.name.trim().to_string();
        if manifest.name.is_empty() {
            return Err(LoadError::EmptyIdentity);
        }

        if let Some(existing) = registry.get(&manifest.name) {
            return Err(LoadError::DuplicateIdentity {
                name: manifest.name,
                existing: existing.descriptor().origin.clone(),
            });
        }

        let config_path = self.config_dir.join(format!("{}.toml", manifest.name));
        let config = PluginConfig::load(&config_path).unwrap_or_else(|e| {
            tracing::warn!(
                plugin = %manifest.name,
                path = %config_path.display(),
                error = %e,
                "Ignoring unreadable plugin config"
            );
            PluginConfig::default()
        });
        let mut context = PluginContext::with_config(manifest.name.clone(), dir.to_path_buf(), config);

        let init = std::panic::catch_unwind(AssertUnwindSafe(|| bound.instance.init(&mut context)));
        match init {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(LoadError::InitFailed(e.to_string())),
            Err(_) => {
                return Err(LoadError::Panicked {
                    stage: LoadStage::Init,
                });
            }
        }

        let descriptor = PluginDescriptor::from_manifest(manifest, path);
        Ok(LoadedPlugin::new(descriptor, bound))
    }
}
