//! Plugin registry - the loaded plugins, in load order

use anyrun_plugin_api::{ActionOutcome, Match, PluginManifest};
use serde::Serialize;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::binder::BoundPlugin;
use super::error::{ActionError, QueryError};

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Identity and display metadata of a loaded plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    /// Unique name, as reported by the plugin
    pub name: String,
    pub label: String,
    pub icon: Option<String>,
    pub version: String,
    pub description: String,
    /// File the plugin was loaded from
    pub origin: PathBuf,
}

impl PluginDescriptor {
    pub fn from_manifest(manifest: PluginManifest, origin: &Path) -> Self {
        let label = manifest.display_label().to_string();
        Self {
            name: manifest.name,
            label,
            icon: manifest.icon,
            version: manifest.version,
            description: manifest.description,
            origin: origin.to_path_buf(),
        }
    }
}

/// A loaded plugin with its capability handle
pub struct LoadedPlugin {
    descriptor: PluginDescriptor,
    /// Process-unique, never reused
    instance_id: u64,
    /// Set once the plugin panics; a failed plugin receives no more calls
    failed: AtomicBool,
    /// Single permit held while a query runs on a blocking worker
    in_flight: Arc<Semaphore>,
    bound: BoundPlugin,
}

impl LoadedPlugin {
    pub(crate) fn new(descriptor: PluginDescriptor, bound: BoundPlugin) -> Self {
        Self {
            descriptor,
            instance_id: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            failed: AtomicBool::new(false),
            in_flight: Arc::new(Semaphore::new(1)),
            bound,
        }
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    fn mark_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }

    /// Whether a query is still running, possibly past its timeout
    pub fn is_busy(&self) -> bool {
        self.in_flight.available_permits() == 0
    }

    /// Wait for the plugin's single query slot.
    ///
    /// The slot is released when the returned [`QuerySlot`] drops, which
    /// happens on the worker thread once the plugin returns, not when a
    /// caller stops waiting.
    pub(crate) async fn claim(self: &Arc<Self>) -> Option<QuerySlot> {
        let permit = Arc::clone(&self.in_flight).acquire_owned().await.ok()?;
        Some(QuerySlot {
            plugin: Arc::clone(self),
            _permit: permit,
        })
    }

    /// Run the plugin's query entry point with panic isolation
    pub(crate) fn query(&self, input: &str) -> Result<Vec<Match>, QueryError> {
        let result =
            std::panic::catch_unwind(AssertUnwindSafe(|| self.bound.instance.query(input)));

        match result {
            Ok(Ok(matches)) => Ok(matches),
            Ok(Err(e)) => Err(QueryError::Plugin(e.to_string())),
            Err(_) => {
                self.mark_failed();
                Err(QueryError::Panicked)
            }
        }
    }

    /// Run the plugin's action entry point with panic isolation
    pub(crate) fn handle_action(&self, action: u64) -> Result<ActionOutcome, ActionError> {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.bound.instance.handle_action(action)
        }));

        match result {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(source)) => Err(ActionError::Plugin {
                plugin: self.descriptor.name.clone(),
                source,
            }),
            Err(_) => {
                self.mark_failed();
                tracing::error!(plugin = %self.descriptor.name, "Plugin panicked during action, disabling");
                Err(ActionError::Panicked {
                    plugin: self.descriptor.name.clone(),
                })
            }
        }
    }
}

/// Exclusive right to run one query on a plugin
pub(crate) struct QuerySlot {
    plugin: Arc<LoadedPlugin>,
    _permit: OwnedSemaphorePermit,
}

impl QuerySlot {
    pub(crate) fn query(&self, input: &str) -> Result<Vec<Match>, QueryError> {
        self.plugin.query(input)
    }
}

impl Drop for LoadedPlugin {
    fn drop(&mut self) {
        // Runs before `bound` drops, so the library is still mapped.
        let result =
            std::panic::catch_unwind(AssertUnwindSafe(|| self.bound.instance.on_unload()));

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(
                    plugin = %self.descriptor.name,
                    error = %e,
                    "Plugin on_unload returned error"
                );
            }
            Err(_) => {
                tracing::error!(plugin = %self.descriptor.name, "Plugin panicked in on_unload");
            }
        }
    }
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("descriptor", &self.descriptor)
            .field("instance_id", &self.instance_id)
            .field("failed", &self.is_failed())
            .field("busy", &self.is_busy())
            .finish_non_exhaustive()
    }
}

/// Loaded plugins keyed by name, iterated in load order.
///
/// Built once by the loader. Only [`Aggregator::unload`](super::Aggregator::unload),
/// which needs exclusive access, removes entries.
#[derive(Debug, Default)]
pub struct Registry {
    plugins: Vec<Arc<LoadedPlugin>>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Add a plugin. The loader has already rejected duplicate names.
    pub(crate) fn insert(&mut self, plugin: LoadedPlugin) {
        debug_assert!(!self.index.contains_key(plugin.name()));
        self.index
            .insert(plugin.name().to_string(), self.plugins.len());
        self.plugins.push(Arc::new(plugin));
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<Arc<LoadedPlugin>> {
        let position = self.index.remove(name)?;
        let removed = self.plugins.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<LoadedPlugin>> {
        self.index.get(name).map(|&i| &self.plugins[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Plugins in load order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<LoadedPlugin>> {
        self.plugins.iter()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.plugins.iter().map(|p| p.descriptor())
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyrun_plugin_api::{Plugin, PluginError};
    use std::sync::atomic::AtomicUsize;

    struct Recorder {
        name: &'static str,
        unloads: Arc<AtomicUsize>,
    }

    impl Plugin for Recorder {
        fn manifest(&self) -> PluginManifest {
            PluginManifest {
                name: self.name.to_string(),
                ..Default::default()
            }
        }

        fn query(&self, input: &str) -> Result<Vec<Match>, PluginError> {
            match input {
                "boom" => panic!("query exploded"),
                "bad" => Err(PluginError::custom("bad input")),
                _ => Ok(vec![Match::new(format!("{}:{input}", self.name))]),
            }
        }

        fn on_unload(&mut self) -> Result<(), PluginError> {
            self.unloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn loaded(name: &'static str, unloads: &Arc<AtomicUsize>) -> LoadedPlugin {
        let plugin = Recorder {
            name,
            unloads: Arc::clone(unloads),
        };
        let descriptor =
            PluginDescriptor::from_manifest(plugin.manifest(), Path::new("/p/librecorder.so"));
        LoadedPlugin::new(descriptor, BoundPlugin::in_process(Box::new(plugin)))
    }

    #[test]
    fn test_descriptor_uses_name_when_label_missing() {
        let manifest = PluginManifest {
            name: "ssh".to_string(),
            icon: Some("network-wired".to_string()),
            ..Default::default()
        };
        let descriptor = PluginDescriptor::from_manifest(manifest, Path::new("/a/libssh.so"));

        assert_eq!(descriptor.label, "ssh");
        assert_eq!(descriptor.icon.as_deref(), Some("network-wired"));
        assert_eq!(descriptor.origin, PathBuf::from("/a/libssh.so"));
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let unloads = Arc::new(AtomicUsize::new(0));
        let a = loaded("a", &unloads);
        let b = loaded("a", &unloads);
        assert_ne!(a.instance_id(), b.instance_id());
    }

    #[test]
    fn test_registry_keeps_load_order() {
        let unloads = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::default();
        registry.insert(loaded("zeta", &unloads));
        registry.insert(loaded("alpha", &unloads));
        registry.insert(loaded("mid", &unloads));

        let names: Vec<&str> = registry.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert!(registry.contains("alpha"));
        assert_eq!(registry.get("mid").unwrap().name(), "mid");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_registry_remove_reindexes() {
        let unloads = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::default();
        registry.insert(loaded("a", &unloads));
        registry.insert(loaded("b", &unloads));
        registry.insert(loaded("c", &unloads));

        let removed = registry.remove("a").unwrap();
        assert_eq!(removed.name(), "a");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("c").unwrap().name(), "c");
        assert_eq!(registry.get("b").unwrap().name(), "b");
        assert!(registry.remove("a").is_none());
    }

    #[test]
    fn test_drop_calls_on_unload_once() {
        let unloads = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::default();
        registry.insert(loaded("a", &unloads));

        drop(registry);
        assert_eq!(unloads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_query_error_does_not_mark_failed() {
        let unloads = Arc::new(AtomicUsize::new(0));
        let plugin = loaded("a", &unloads);

        assert_eq!(plugin.query("x").unwrap()[0].title, "a:x");
        assert!(matches!(plugin.query("bad"), Err(QueryError::Plugin(_))));
        assert!(!plugin.is_failed());
    }

    #[test]
    fn test_query_panic_marks_failed() {
        let unloads = Arc::new(AtomicUsize::new(0));
        let plugin = loaded("a", &unloads);

        assert_eq!(plugin.query("boom"), Err(QueryError::Panicked));
        assert!(plugin.is_failed());
    }

    #[tokio::test]
    async fn test_query_slot_is_exclusive_until_released() {
        let unloads = Arc::new(AtomicUsize::new(0));
        let plugin = Arc::new(loaded("a", &unloads));

        let slot = plugin.claim().await.unwrap();
        assert!(plugin.is_busy());
        let second = tokio::time::timeout(std::time::Duration::from_millis(20), plugin.claim()).await;
        assert!(second.is_err());
        assert_eq!(slot.query("x").unwrap()[0].title, "a:x");

        drop(slot);
        assert!(!plugin.is_busy());
        assert!(plugin.claim().await.is_some());
    }

    #[test]
    fn test_default_action_is_plugin_error() {
        let unloads = Arc::new(AtomicUsize::new(0));
        let plugin = loaded("a", &unloads);

        let err = plugin.handle_action(1).unwrap_err();
        assert!(matches!(err, ActionError::Plugin { .. }));
        assert!(!plugin.is_failed());
    }
}
