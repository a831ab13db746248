//! QuerySession - keeps only the latest aggregation pass alive

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::aggregator::{AggregatedResultSet, Aggregator, QueryScope};

/// A submitted aggregation pass
pub struct PendingPass {
    generation: u64,
    latest: Arc<AtomicU64>,
    handle: JoinHandle<Option<AggregatedResultSet>>,
}

impl PendingPass {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether no newer pass has been submitted since this one
    pub fn is_latest(&self) -> bool {
        self.latest.load(Ordering::Acquire) == self.generation
    }

    /// Wait for the pass. `None` if it was superseded or cancelled.
    pub async fn wait(self) -> Option<AggregatedResultSet> {
        let Self {
            generation,
            latest,
            handle,
        } = self;
        let result = handle.await.ok().flatten()?;
        (latest.load(Ordering::Acquire) == generation).then_some(result)
    }
}

/// Submits queries as the user types, cancelling whatever pass is in flight.
///
/// Must be used from within a tokio runtime.
pub struct QuerySession {
    aggregator: Arc<Aggregator>,
    scope: QueryScope,
    current: Option<CancellationToken>,
    latest: Arc<AtomicU64>,
}

impl QuerySession {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self {
            aggregator,
            scope: QueryScope::All,
            current: None,
            latest: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    /// Restrict later passes to one plugin, or lift the restriction
    pub fn set_scope(&mut self, scope: QueryScope) {
        self.scope = scope;
    }

    pub fn scope(&self) -> &QueryScope {
        &self.scope
    }

    /// Start a pass for `input`, superseding the previous one.
    ///
    /// When no plugin is selected and a plugin's route claims the input with
    /// `replace`, the session narrows to that plugin and queries it with an
    /// empty input instead.
    pub fn submit(&mut self, input: impl Into<String>) -> PendingPass {
        self.cancel();

        let mut input = input.into();
        if self.scope == QueryScope::All {
            if let Some(name) = self.aggregator.scope_switch(&input) {
                tracing::debug!(plugin = %name, "Input claimed, switching scope");
                self.scope = QueryScope::Plugin(name.to_string());
                input.clear();
            }
        }

        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        let cancel = CancellationToken::new();
        self.current = Some(cancel.clone());

        let aggregator = Arc::clone(&self.aggregator);
        let scope = self.scope.clone();
        let handle = tokio::spawn(async move {
            aggregator.query_scoped(&input, &scope, &cancel).await
        });

        tracing::trace!(generation, "Aggregation pass submitted");
        PendingPass {
            generation,
            latest: Arc::clone(&self.latest),
            handle,
        }
    }

    /// Cancel the in-flight pass, if any
    pub fn cancel(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }
}

impl Drop for QuerySession {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::aggregator::AggregatorConfig;
    use crate::plugins::loader::PluginLoader;
    use crate::plugins::loader::testing::{StaticBinder, lib_name, touch};
    use crate::plugins::path::PluginPath;
    use crate::plugins::routing::{PluginRoute, RoutingTable};
    use anyrun_plugin_api::{Match, Plugin, PluginError, PluginManifest};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Echoes the input, sleeping longer for shorter inputs
    #[derive(Default)]
    struct Echo;

    impl Plugin for Echo {
        fn manifest(&self) -> PluginManifest {
            PluginManifest {
                name: "echo".to_string(),
                ..Default::default()
            }
        }

        fn query(&self, input: &str) -> Result<Vec<Match>, PluginError> {
            if input.len() < 3 {
                std::thread::sleep(Duration::from_millis(200));
            }
            Ok(vec![Match::new(input)])
        }
    }

    fn session() -> (QuerySession, TempDir) {
        session_with(AggregatorConfig::default())
    }

    fn session_with(config: AggregatorConfig) -> (QuerySession, TempDir) {
        let dir = TempDir::new().unwrap();
        let lib = touch(dir.path(), &lib_name("echo"));
        let binder = StaticBinder::default().with(lib, || Box::new(Echo));
        let loader = PluginLoader::with_binder(binder).with_config_dir(dir.path());
        let (registry, _) = loader.load(&PluginPath::resolve(dir.path()));
        let aggregator = Aggregator::new(registry, config);
        (QuerySession::new(Arc::new(aggregator)), dir)
    }

    #[tokio::test]
    async fn test_single_pass_completes() {
        let (mut session, _dir) = session();

        let pass = session.submit("firefox");
        assert_eq!(pass.generation(), 1);

        let set = pass.wait().await.unwrap();
        assert_eq!(set.get(0).unwrap().entry.title, "firefox");
    }

    #[tokio::test]
    async fn test_newer_query_supersedes_older() {
        let (mut session, _dir) = session();

        let first = session.submit("f");
        let second = session.submit("fir");

        assert!(!first.is_latest());
        assert!(second.is_latest());
        assert!(first.wait().await.is_none());

        let set = second.wait().await.unwrap();
        assert_eq!(set.get(0).unwrap().entry.title, "fir");
    }

    #[tokio::test]
    async fn test_cancel_drops_in_flight_pass() {
        let (mut session, _dir) = session();

        let pass = session.submit("f");
        session.cancel();

        assert!(pass.wait().await.is_none());
    }

    #[tokio::test]
    async fn test_scope_applies_to_later_passes() {
        let (mut session, _dir) = session();

        session.set_scope(QueryScope::Plugin("other".to_string()));
        let set = session.submit("firefox").wait().await.unwrap();
        assert!(set.is_empty());

        session.set_scope(QueryScope::All);
        assert_eq!(session.scope(), &QueryScope::All);
        let set = session.submit("firefox").wait().await.unwrap();
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_claimed_input_switches_scope_to_plugin() {
        let route = PluginRoute {
            regex: Some(regex::Regex::new("^>").unwrap()),
            ..Default::default()
        };
        let (mut session, _dir) = session_with(AggregatorConfig {
            routes: RoutingTable::default().with_route("echo", route),
            ..Default::default()
        });

        let set = session.submit(">").wait().await.unwrap();
        assert_eq!(session.scope(), &QueryScope::Plugin("echo".to_string()));
        assert_eq!(set.input, "");
        assert_eq!(set.get(0).unwrap().entry.title, "");

        // Once narrowed, input goes to the plugin unchanged.
        let set = session.submit(">abc").wait().await.unwrap();
        assert_eq!(set.get(0).unwrap().entry.title, ">abc");
    }
}
