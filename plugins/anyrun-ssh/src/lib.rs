//! SSH plugin - lists `Host` entries from `~/.ssh/config`
//!
//! Activating a match opens a terminal running `ssh <host>`.
//!
//! ## Configuration
//!
//! `~/.config/anyrun/plugins/ssh.toml`:
//!
//! ```toml
//! config_path = "/home/me/.ssh/config"   # defaults to ~/.ssh/config
//! terminal = "foot"                      # defaults to $TERMINAL, then xterm
//! ```

use anyrun_plugin_api::{
    ActionOutcome, Match, Plugin, PluginContext, PluginError, PluginManifest, export_plugin,
    spawn_detached,
};
use std::path::{Path, PathBuf};
use std::process::Command;

/// One `Host` block of an OpenSSH client config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshHost {
    pub alias: String,
    pub hostname: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
}

impl SshHost {
    fn new(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            ..Default::default()
        }
    }

    /// `user@hostname:port`, omitting parts that are not set
    pub fn target(&self) -> String {
        let mut target = String::new();
        if let Some(user) = &self.user {
            target.push_str(user);
            target.push('@');
        }
        target.push_str(self.hostname.as_deref().unwrap_or(&self.alias));
        if let Some(port) = self.port {
            target.push_str(&format!(":{port}"));
        }
        target
    }

    fn matches(&self, needle: &str) -> bool {
        self.alias.to_lowercase().contains(needle)
            || self
                .hostname
                .as_ref()
                .is_some_and(|h| h.to_lowercase().contains(needle))
    }
}

/// Parse the `Host` blocks of an OpenSSH client config.
///
/// Wildcard patterns are skipped; a block with several aliases yields one
/// host per alias. Unknown keys and malformed lines are ignored.
pub fn parse_config(content: &str) -> Vec<SshHost> {
    let mut hosts: Vec<SshHost> = Vec::new();
    let mut current: Vec<SshHost> = Vec::new();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = split_keyword(line) else {
            continue;
        };

        match key.to_ascii_lowercase().as_str() {
            "host" => {
                hosts.append(&mut current);
                current = value
                    .split_whitespace()
                    .filter(|alias| !alias.contains(['*', '?', '!']))
                    .map(SshHost::new)
                    .collect();
            }
            "match" => hosts.append(&mut current),
            "hostname" => current.iter_mut().for_each(|h| h.hostname = Some(value.to_string())),
            "user" => current.iter_mut().for_each(|h| h.user = Some(value.to_string())),
            "port" => {
                if let Ok(port) = value.parse() {
                    current.iter_mut().for_each(|h| h.port = Some(port));
                }
            }
            _ => {}
        }
    }

    hosts.append(&mut current);
    hosts
}

/// Split `Key value` or `Key=value`
fn split_keyword(line: &str) -> Option<(&str, &str)> {
    let split_at = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let (key, rest) = line.split_at(split_at);
    let value = rest
        .trim_start_matches(|c: char| c.is_whitespace() || c == '=')
        .trim();
    (!value.is_empty()).then_some((key, value))
}

#[derive(Default)]
pub struct SshPlugin {
    hosts: Vec<SshHost>,
    terminal: Option<String>,
}

impl SshPlugin {
    pub fn with_hosts(hosts: Vec<SshHost>) -> Self {
        Self {
            hosts,
            terminal: None,
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".ssh").join("config"))
    }

    fn load_hosts(path: &Path) -> Result<Vec<SshHost>, PluginError> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(parse_config(&std::fs::read_to_string(path)?))
    }
}

impl Plugin for SshPlugin {
    fn manifest(&self) -> PluginManifest {
        PluginManifest {
            name: "ssh".to_string(),
            label: "SSH connections".to_string(),
            icon: Some("network-wired".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Connect to hosts from ~/.ssh/config".to_string(),
            ..Default::default()
        }
    }

    fn init(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError> {
        let path = ctx
            .config_get::<PathBuf>("config_path")
            .or_else(Self::default_config_path)
            .ok_or_else(|| PluginError::config("no home directory and no config_path set"))?;

        self.hosts = Self::load_hosts(&path)?;
        self.terminal = ctx
            .config_get::<String>("terminal")
            .or_else(|| std::env::var("TERMINAL").ok());

        ctx.log_debug(&format!(
            "Read {} hosts from {}",
            self.hosts.len(),
            path.display()
        ));
        Ok(())
    }

    fn query(&self, input: &str) -> Result<Vec<Match>, PluginError> {
        let needle = input.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        Ok(self
            .hosts
            .iter()
            .enumerate()
            .filter(|(_, host)| host.matches(&needle))
            .map(|(i, host)| {
                let score = if host.alias.to_lowercase().starts_with(&needle) {
                    2
                } else {
                    1
                };
                Match::new(&host.alias)
                    .with_description(host.target())
                    .with_icon("network-wired")
                    .with_score(score)
                    .with_action(i as u64)
            })
            .collect())
    }

    fn handle_action(&self, action: u64) -> Result<ActionOutcome, PluginError> {
        let host = usize::try_from(action)
            .ok()
            .and_then(|i| self.hosts.get(i))
            .ok_or(PluginError::UnknownAction(action))?;

        let terminal = self.terminal.as_deref().unwrap_or("xterm");
        spawn_detached(Command::new(terminal).args(["-e", "ssh", &host.alias]))?;

        Ok(ActionOutcome::Close)
    }
}

export_plugin!(SshPlugin);
