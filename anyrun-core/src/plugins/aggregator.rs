//! Aggregator - fans a query out to every plugin and merges the answers

use anyrun_plugin_api::{ActionOutcome, Match};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::error::{ActionError, PluginHostError, QueryError, StaleHandleError};
use super::registry::{LoadedPlugin, PluginDescriptor, Registry};
use super::routing::{LabelMatcher, RoutingTable};

/// How matches from different plugins are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// One group per plugin, groups in registry order
    #[default]
    Grouped,
    /// Grouped order, then stable-sorted by descending score
    Score,
}

/// Aggregator tuning
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// How long one plugin may take to answer one query, not counting
    /// time spent waiting for a worker
    pub handler_timeout: Duration,
    /// Maximum number of plugin queries running at once
    pub max_concurrency: usize,
    pub merge_policy: MergePolicy,
    pub routes: RoutingTable,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(5),
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            merge_policy: MergePolicy::default(),
            routes: RoutingTable::default(),
        }
    }
}

/// Which plugins a pass is dispatched to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum QueryScope {
    #[default]
    All,
    /// Only the named plugin
    Plugin(String),
}

/// Routes an activated match back to the plugin instance that produced it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionToken {
    plugin: String,
    instance: u64,
    action: u64,
}

impl ActionToken {
    /// Name of the owning plugin
    pub fn plugin(&self) -> &str {
        &self.plugin
    }
}

/// A match tagged with its owning plugin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedMatch {
    pub plugin: String,
    #[serde(flatten)]
    pub entry: Match,
    /// Present when the plugin attached an action to the match
    #[serde(skip)]
    pub token: Option<ActionToken>,
    /// Set on "open" entries: activating one narrows the session to this plugin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opens: Option<String>,
}

/// Output of one aggregation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AggregatedResultSet {
    pub input: String,
    pub matches: Vec<AggregatedMatch>,
}

impl AggregatedResultSet {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AggregatedMatch> {
        self.matches.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AggregatedMatch> {
        self.matches.iter()
    }
}

/// Dispatches queries to the plugins of a [`Registry`].
///
/// Queries only need `&self`; [`unload`](Self::unload) needs `&mut self`, so
/// the registry never changes while a pass is running.
#[derive(Debug)]
pub struct Aggregator {
    registry: Registry,
    config: AggregatorConfig,
    workers: Arc<Semaphore>,
}

impl Aggregator {
    pub fn new(registry: Registry, config: AggregatorConfig) -> Self {
        let workers = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            registry,
            config,
            workers,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Run one pass over every plugin
    pub async fn query(&self, input: &str) -> AggregatedResultSet {
        let never = CancellationToken::new();
        self.query_scoped(input, &QueryScope::All, &never)
            .await
            .unwrap_or_default()
    }

    /// The plugin that takes over the session for `input`, if any.
    ///
    /// The first live plugin, in registry order, whose route has `replace`
    /// set and whose regex matches. Empty input is never claimed.
    pub fn scope_switch(&self, input: &str) -> Option<&str> {
        if input.is_empty() {
            return None;
        }
        self.registry
            .iter()
            .filter(|p| !p.is_failed())
            .find(|p| {
                let route = self.config.routes.route(p.name());
                route.replace && route.claims(input)
            })
            .map(|p| p.name())
    }

    /// Run one pass over the plugins in `scope`.
    ///
    /// Returns `None` if `cancel` fires before every plugin has answered or
    /// timed out.
    pub async fn query_scoped(
        &self,
        input: &str,
        scope: &QueryScope,
        cancel: &CancellationToken,
    ) -> Option<AggregatedResultSet> {
        let input: Arc<str> = Arc::from(input);

        let slots: Vec<_> = self
            .plan(&input, scope)
            .into_iter()
            .map(|target| match target {
                Target::Query(plugin) => {
                    let handle = tokio::spawn(dispatch(
                        Arc::clone(plugin),
                        Arc::clone(&input),
                        Arc::clone(&self.workers),
                        self.config.handler_timeout,
                    ));
                    Slot::Pending(Arc::clone(plugin), handle)
                }
                Target::Offer(plugin, score) => Slot::Ready(vec![opener(plugin, score)]),
            })
            .collect();

        let aborts: Vec<_> = slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Pending(_, handle) => Some(handle.abort_handle()),
                Slot::Ready(_) => None,
            })
            .collect();

        let collect = async move {
            let mut groups = Vec::with_capacity(slots.len());
            for slot in slots {
                let group = match slot {
                    Slot::Ready(group) => group,
                    Slot::Pending(plugin, handle) => {
                        let result = handle.await.unwrap_or(Err(QueryError::Interrupted));
                        let matches = match result {
                            Ok(matches) => matches,
                            Err(QueryError::Panicked) => {
                                tracing::error!(plugin = %plugin.name(), "Plugin panicked during query, disabling");
                                Vec::new()
                            }
                            Err(QueryError::Busy) => {
                                tracing::debug!(plugin = %plugin.name(), "Plugin still busy, skipped");
                                Vec::new()
                            }
                            Err(e) => {
                                tracing::warn!(plugin = %plugin.name(), error = %e, "Dropping plugin results");
                                Vec::new()
                            }
                        };
                        tag(&plugin, matches)
                    }
                };
                groups.push(group);
            }
            groups
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                for abort in aborts {
                    abort.abort();
                }
                tracing::debug!(input = %input, "Aggregation pass cancelled");
                None
            }
            groups = collect => Some(merge(&input, groups, self.config.merge_policy)),
        }
    }

    /// Which plugins a pass asks, in registry order
    fn plan<'a>(&'a self, input: &str, scope: &QueryScope) -> Vec<Target<'a>> {
        let routes = &self.config.routes;
        let live: Vec<&Arc<LoadedPlugin>> =
            self.registry.iter().filter(|p| !p.is_failed()).collect();

        match scope {
            QueryScope::Plugin(name) => self
                .registry
                .get(name)
                .filter(|p| !p.is_failed())
                .map(Target::Query)
                .into_iter()
                .collect(),
            QueryScope::All if input.is_empty() => live
                .into_iter()
                .filter(|p| routes.route(p.name()).is_default())
                .map(Target::Query)
                .collect(),
            QueryScope::All => {
                let exclusive = live.iter().copied().find(|p| {
                    let route = routes.route(p.name());
                    !route.replace && route.claims(input)
                });
                if let Some(plugin) = exclusive {
                    return vec![Target::Query(plugin)];
                }

                let mut labels = LabelMatcher::new(input);
                live.into_iter()
                    .filter_map(|p| {
                        let route = routes.route(p.name());
                        if !route.default {
                            labels
                                .score(&p.descriptor().label)
                                .map(|score| Target::Offer(p, score))
                        } else if route.regex.is_none() {
                            Some(Target::Query(p))
                        } else {
                            None
                        }
                    })
                    .collect()
            }
        }
    }

    /// Run the action behind an activated match
    pub fn handle_action(&self, token: &ActionToken) -> Result<ActionOutcome, ActionError> {
        let plugin = self
            .registry
            .get(&token.plugin)
            .filter(|p| p.instance_id() == token.instance && !p.is_failed())
            .ok_or_else(|| StaleHandleError {
                plugin: token.plugin.clone(),
                instance: token.instance,
            })?;

        plugin.handle_action(token.action)
    }

    /// Remove a plugin from the registry. Its action tokens become stale.
    pub fn unload(&mut self, name: &str) -> Result<PluginDescriptor, PluginHostError> {
        let removed = self
            .registry
            .remove(name)
            .ok_or_else(|| PluginHostError::NotFound {
                name: name.to_string(),
            })?;
        tracing::info!(plugin = %name, "Plugin unloaded");
        Ok(removed.descriptor().clone())
    }
}

enum Target<'a> {
    Query(&'a Arc<LoadedPlugin>),
    /// Offer an "open" entry instead of querying
    Offer(&'a Arc<LoadedPlugin>, u32),
}

enum Slot {
    Pending(
        Arc<LoadedPlugin>,
        tokio::task::JoinHandle<Result<Vec<Match>, QueryError>>,
    ),
    Ready(Vec<AggregatedMatch>),
}

/// Query one plugin on a blocking worker, bounded by the worker pool and the
/// per-plugin timeout.
///
/// A plugin runs at most one query at a time. A pass waits up to `timeout`
/// for the plugin's previous query to return and otherwise skips it with
/// [`QueryError::Busy`], so a hung plugin pins a single blocking thread.
/// The run timeout starts once a worker permit is held. On timeout the worker
/// thread keeps running until the plugin returns, but the permit is released
/// and the result discarded.
async fn dispatch(
    plugin: Arc<LoadedPlugin>,
    input: Arc<str>,
    workers: Arc<Semaphore>,
    timeout: Duration,
) -> Result<Vec<Match>, QueryError> {
    let slot = tokio::time::timeout(timeout, plugin.claim())
        .await
        .map_err(|_| QueryError::Busy)?
        .ok_or(QueryError::Interrupted)?;
    let _permit = workers
        .acquire_owned()
        .await
        .map_err(|_| QueryError::Interrupted)?;

    let work = tokio::task::spawn_blocking(move || slot.query(&input));

    match tokio::time::timeout(timeout, work).await {
        Ok(joined) => joined.unwrap_or(Err(QueryError::Interrupted)),
        Err(_) => Err(QueryError::TimedOut { timeout }),
    }
}

/// Tag a plugin's matches with their owner and action tokens
fn tag(plugin: &LoadedPlugin, entries: Vec<Match>) -> Vec<AggregatedMatch> {
    entries
        .into_iter()
        .map(|entry| AggregatedMatch {
            plugin: plugin.name().to_string(),
            token: entry.action.map(|action| ActionToken {
                plugin: plugin.name().to_string(),
                instance: plugin.instance_id(),
                action,
            }),
            opens: None,
            entry,
        })
        .collect()
}

fn opener(plugin: &LoadedPlugin, score: u32) -> AggregatedMatch {
    let descriptor = plugin.descriptor();
    let mut entry = Match::new(descriptor.label.clone())
        .with_description("Plugin")
        .with_score(u64::from(score));
    entry.icon = descriptor.icon.clone();

    AggregatedMatch {
        plugin: plugin.name().to_string(),
        entry,
        token: None,
        opens: Some(plugin.name().to_string()),
    }
}

fn merge(
    input: &str,
    groups: Vec<Vec<AggregatedMatch>>,
    policy: MergePolicy,
) -> AggregatedResultSet {
    let mut matches: Vec<AggregatedMatch> = groups.into_iter().flatten().collect();

    if policy == MergePolicy::Score {
        matches.sort_by(|a, b| b.entry.score.cmp(&a.entry.score));
    }

    AggregatedResultSet {
        input: input.to_string(),
        matches,
    }
}
