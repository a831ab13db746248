//! Plugin metadata and query result types

use serde::{Deserialize, Serialize};

/// Plugin manifest containing identity and display metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique plugin name (used as the plugin's identity in the registry)
    pub name: String,
    /// Human-readable label shown next to the plugin's matches
    pub label: String,
    /// Optional icon name or path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Plugin version (semver)
    pub version: String,
    /// API version this plugin was built against
    pub api_version: u32,
    /// Human-readable description
    pub description: String,
}

impl Default for PluginManifest {
    fn default() -> Self {
        Self {
            name: String::new(),
            label: String::new(),
            icon: None,
            version: "0.0.1".to_string(),
            api_version: crate::API_VERSION,
            description: String::new(),
        }
    }
}

impl PluginManifest {
    /// Label to display, falling back to the name when no label is set
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.name
        } else {
            &self.label
        }
    }
}

/// A single result produced by a plugin for a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Main line of text
    pub title: String,
    /// Secondary line of text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Icon name or path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Relevance, higher is better. Only comparable within one plugin.
    #[serde(default)]
    pub score: u64,
    /// Plugin-scoped action id passed back to `Plugin::handle_action`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<u64>,
}

impl Match {
    /// Create a match with only a title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            icon: None,
            score: 0,
            action: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_score(mut self, score: u64) -> Self {
        self.score = score;
        self
    }

    pub fn with_action(mut self, action: u64) -> Self {
        self.action = Some(action);
        self
    }
}

/// What the launcher should do after an action ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Close the launcher
    Close,
    /// Keep the launcher open and re-run the current query
    Refresh,
    /// Put the text on the clipboard and close
    Copy(String),
    /// Write the text to standard output and close
    Print(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_default_api_version() {
        let manifest = PluginManifest::default();
        assert_eq!(manifest.api_version, crate::API_VERSION);
        assert!(manifest.icon.is_none());
    }

    #[test]
    fn test_display_label_falls_back_to_name() {
        let mut manifest = PluginManifest {
            name: "ssh".to_string(),
            ..Default::default()
        };
        assert_eq!(manifest.display_label(), "ssh");

        manifest.label = "SSH connections".to_string();
        assert_eq!(manifest.display_label(), "SSH connections");
    }

    #[test]
    fn test_manifest_toml_omits_missing_icon() {
        let manifest = PluginManifest {
            name: "shell".to_string(),
            label: "Terminal".to_string(),
            ..Default::default()
        };

        let toml_str = toml::to_string(&manifest).unwrap();
        assert!(!toml_str.contains("icon"));

        let parsed: PluginManifest = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_match_builder() {
        let m = Match::new("htop")
            .with_description("/bin/bash")
            .with_icon("terminal")
            .with_score(10)
            .with_action(3);

        assert_eq!(m.title, "htop");
        assert_eq!(m.description.as_deref(), Some("/bin/bash"));
        assert_eq!(m.icon.as_deref(), Some("terminal"));
        assert_eq!(m.score, 10);
        assert_eq!(m.action, Some(3));
    }

    #[test]
    fn test_action_outcome_json_shape() {
        let json = serde_json::to_string(&ActionOutcome::Copy("42".to_string())).unwrap();
        assert_eq!(json, r#"{"type":"copy","value":"42"}"#);

        let json = serde_json::to_string(&ActionOutcome::Close).unwrap();
        assert_eq!(json, r#"{"type":"close"}"#);
    }
}
