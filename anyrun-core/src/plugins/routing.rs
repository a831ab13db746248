//! Per-plugin query routing
//!
//! Each plugin can claim inputs matching a regex, either by taking over the
//! session (`replace`) or by becoming the only plugin asked for that input.
//! Plugins that are not part of the default set are offered as "open"
//! entries whose label fuzzy-matches the input.

use nucleo::pattern::{CaseMatching, Normalization, Pattern};
use nucleo::{Config, Matcher, Utf32Str};
use regex::Regex;
use std::collections::HashMap;

static DEFAULT_ROUTE: PluginRoute = PluginRoute {
    default: true,
    regex: None,
    replace: true,
};

/// Routing settings of one plugin
#[derive(Debug, Clone)]
pub struct PluginRoute {
    /// Queried on every pass that no regex claims
    pub default: bool,
    /// Inputs this plugin claims
    pub regex: Option<Regex>,
    /// A claimed input switches the session to this plugin instead of
    /// filtering the pass down to it
    pub replace: bool,
}

impl Default for PluginRoute {
    fn default() -> Self {
        DEFAULT_ROUTE.clone()
    }
}

impl PluginRoute {
    /// Whether this plugin's regex claims `input`
    pub fn claims(&self, input: &str) -> bool {
        self.regex.as_ref().is_some_and(|re| re.is_match(input))
    }

    /// Whether unclaimed passes query this plugin
    pub fn is_default(&self) -> bool {
        self.default && self.regex.is_none()
    }
}

/// Routes keyed by plugin name. Plugins without an entry use
/// [`PluginRoute::default`].
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<String, PluginRoute>,
}

impl RoutingTable {
    pub fn with_route(mut self, plugin: impl Into<String>, route: PluginRoute) -> Self {
        self.insert(plugin, route);
        self
    }

    pub fn insert(&mut self, plugin: impl Into<String>, route: PluginRoute) {
        self.routes.insert(plugin.into(), route);
    }

    pub fn route(&self, plugin: &str) -> &PluginRoute {
        self.routes.get(plugin).unwrap_or(&DEFAULT_ROUTE)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Scores plugin labels against one input
pub(crate) struct LabelMatcher {
    matcher: Matcher,
    pattern: Pattern,
    buf: Vec<char>,
}

impl LabelMatcher {
    pub(crate) fn new(input: &str) -> Self {
        Self {
            matcher: Matcher::new(Config::DEFAULT),
            pattern: Pattern::parse(input, CaseMatching::Ignore, Normalization::Smart),
            buf: Vec::new(),
        }
    }

    pub(crate) fn score(&mut self, label: &str) -> Option<u32> {
        let haystack = Utf32Str::new(label, &mut self.buf);
        self.pattern.score(haystack, &mut self.matcher)
    }
}
