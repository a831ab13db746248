//! Shell plugin - offers to run whatever was typed as a shell command
//!
//! ## Configuration
//!
//! `~/.config/anyrun/plugins/shell.toml`:
//!
//! ```toml
//! shell = "/bin/zsh"   # defaults to $SHELL, then sh
//! ```
//!
//! ## Installing
//!
//! ```bash
//! cargo build --release -p anyrun-shell
//! cp target/release/libanyrun_shell.so ~/.local/lib/anyrun/
//! export ANYRUN_PLUGINS="$HOME/.local/lib/anyrun:$ANYRUN_PLUGINS"
//! ```

use anyrun_plugin_api::{
    ActionOutcome, Match, Plugin, PluginContext, PluginError, PluginManifest, export_plugin,
    spawn_detached,
};
use std::collections::VecDeque;
use std::process::Command;
use std::sync::Mutex;

/// Commands offered in recent queries, kept so an action id can be resolved
const REMEMBERED_COMMANDS: usize = 32;

#[derive(Default)]
pub struct ShellPlugin {
    shell: Option<String>,
    offered: Mutex<Offered>,
}

#[derive(Default)]
struct Offered {
    next_id: u64,
    commands: VecDeque<(u64, String)>,
}

impl Offered {
    fn remember(&mut self, command: &str) -> u64 {
        if let Some((id, _)) = self.commands.iter().find(|(_, c)| c == command) {
            return *id;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.commands.push_back((id, command.to_string()));
        if self.commands.len() > REMEMBERED_COMMANDS {
            self.commands.pop_front();
        }
        id
    }

    fn get(&self, id: u64) -> Option<&str> {
        self.commands
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, c)| c.as_str())
    }
}

impl ShellPlugin {
    fn shell(&self) -> &str {
        self.shell.as_deref().unwrap_or("sh")
    }

    fn offered(&self) -> Result<std::sync::MutexGuard<'_, Offered>, PluginError> {
        self.offered
            .lock()
            .map_err(|_| PluginError::custom("command list poisoned"))
    }
}

impl Plugin for ShellPlugin {
    fn manifest(&self) -> PluginManifest {
        PluginManifest {
            name: "shell".to_string(),
            label: "Terminal".to_string(),
            icon: Some("utilities-terminal".to_string()),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: "Run the query as a shell command".to_string(),
            ..Default::default()
        }
    }

    fn init(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError> {
        self.shell = ctx
            .config_get::<String>("shell")
            .or_else(|| std::env::var("SHELL").ok());
        ctx.log_debug(&format!("Using shell {}", self.shell()));
        Ok(())
    }

    fn query(&self, input: &str) -> Result<Vec<Match>, PluginError> {
        let command = input.trim();
        if command.is_empty() {
            return Ok(Vec::new());
        }

        let id = self.offered()?.remember(command);
        Ok(vec![
            Match::new(command)
                .with_description(self.shell())
                .with_icon("utilities-terminal")
                .with_action(id),
        ])
    }

    fn handle_action(&self, action: u64) -> Result<ActionOutcome, PluginError> {
        let command = self
            .offered()?
            .get(action)
            .map(str::to_string)
            .ok_or(PluginError::UnknownAction(action))?;

        spawn_detached(Command::new(self.shell()).arg("-c").arg(&command))?;

        Ok(ActionOutcome::Close)
    }
}

export_plugin!(ShellPlugin);
