//! `anyrun session` - interactive querying over stdin
//!
//! Every input line starts a new pass and supersedes the one in flight, the
//! same way keystrokes do in the launcher window. Lines starting with `:`
//! are commands:
//!
//! - `:run N` activates match `N` of the latest results; on a plugin's
//!   "open" entry it narrows the session to that plugin
//! - `:back` queries all plugins again
//! - `:quit` exits

use anyhow::{Result, anyhow};
use anyrun_core::{AggregatedResultSet, Aggregator, QueryScope, QuerySession};
use anyrun_plugin_api::ActionOutcome;
use clap::Args;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::config::AnyrunConfig;

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Only ask this plugin
    #[arg(long, value_name = "NAME")]
    pub plugin: Option<String>,
}

/// One line of session input
#[derive(Debug, PartialEq, Eq)]
enum SessionInput {
    Query(String),
    /// 1-based index into the latest results
    Run(usize),
    Back,
    Quit,
    Invalid(String),
}

impl SessionInput {
    fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(command) = trimmed.strip_prefix(':') else {
            return SessionInput::Query(line.to_string());
        };

        let mut parts = command.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some("quit" | "q"), None, None) => SessionInput::Quit,
            (Some("back" | "b"), None, None) => SessionInput::Back,
            (Some("run" | "r"), Some(n), None) => match n.parse::<usize>() {
                Ok(n) if n >= 1 => SessionInput::Run(n),
                _ => SessionInput::Invalid(format!("Not a match number: {n}")),
            },
            (Some("run" | "r"), None, None) => {
                SessionInput::Invalid("Usage: :run N".to_string())
            }
            _ => SessionInput::Invalid(format!("Unknown command: {trimmed}")),
        }
    }
}

pub async fn run(args: SessionArgs, config: &AnyrunConfig) -> Result<()> {
    let (aggregator, report) = super::start(config)?;
    tracing::info!(plugins = report.loaded_count(), "Session ready");

    let aggregator = Arc::new(aggregator);
    let mut session = QuerySession::new(Arc::clone(&aggregator));
    if let Some(name) = args.plugin {
        session.set_scope(QueryScope::Plugin(name));
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<(u64, AggregatedResultSet)>();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut current_generation = 0;
    let mut last_input: Option<String> = None;
    let mut latest: Option<AggregatedResultSet> = None;

    loop {
        let submit = tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match SessionInput::parse(&line) {
                    SessionInput::Quit => break,
                    SessionInput::Invalid(message) => {
                        eprintln!("{message}");
                        None
                    }
                    SessionInput::Query(input) => Some(input),
                    SessionInput::Back => {
                        session.set_scope(QueryScope::All);
                        eprintln!("{}", describe_scope(session.scope()));
                        Some(String::new())
                    }
                    SessionInput::Run(n) => match activate(&aggregator, latest.as_ref(), n) {
                        Ok(Activation::Open(plugin)) => {
                            session.set_scope(QueryScope::Plugin(plugin));
                            eprintln!("{}", describe_scope(session.scope()));
                            Some(String::new())
                        }
                        Ok(Activation::Outcome(ActionOutcome::Close)) => break,
                        Ok(Activation::Outcome(ActionOutcome::Refresh)) => last_input.clone(),
                        Ok(Activation::Outcome(ActionOutcome::Copy(text))) => {
                            println!("Copied: {text}");
                            break;
                        }
                        Ok(Activation::Outcome(ActionOutcome::Print(text))) => {
                            println!("{text}");
                            break;
                        }
                        Err(e) => {
                            eprintln!("{e}");
                            None
                        }
                    },
                }
            }
            Some((generation, results)) = rx.recv() => {
                if generation == current_generation {
                    print!("{}", super::query::render(&results, aggregator.registry()));
                    latest = Some(results);
                }
                None
            }
        };

        if let Some(input) = submit {
            let scope = session.scope().clone();
            let pass = session.submit(input.clone());
            current_generation = pass.generation();
            last_input = Some(input);
            if session.scope() != &scope {
                eprintln!("{}", describe_scope(session.scope()));
            }

            let tx = tx.clone();
            tokio::spawn(async move {
                let generation = pass.generation();
                if let Some(results) = pass.wait().await {
                    let _ = tx.send((generation, results));
                }
            });
        }
    }

    session.cancel();
    Ok(())
}

/// What activating a match did
#[derive(Debug, PartialEq)]
enum Activation {
    Outcome(ActionOutcome),
    /// An "open" entry: narrow the session to this plugin
    Open(String),
}

fn describe_scope(scope: &QueryScope) -> String {
    match scope {
        QueryScope::All => "Querying all plugins".to_string(),
        QueryScope::Plugin(name) => format!("Querying '{name}' only; :back returns to all plugins"),
    }
}

/// Run the action of match `n` (1-based) from `results`
fn activate(
    aggregator: &Aggregator,
    results: Option<&AggregatedResultSet>,
    n: usize,
) -> Result<Activation> {
    let results = results.ok_or_else(|| anyhow!("No results yet"))?;
    let selected = n
        .checked_sub(1)
        .and_then(|i| results.get(i))
        .ok_or_else(|| anyhow!("No match {n}; the latest results have {}", results.len()))?;
    if let Some(plugin) = &selected.opens {
        return Ok(Activation::Open(plugin.clone()));
    }
    let token = selected
        .token
        .as_ref()
        .ok_or_else(|| anyhow!("'{}' has no action", selected.entry.title))?;

    tracing::debug!(plugin = %token.plugin(), match_index = n, "Activating match");
    Ok(Activation::Outcome(aggregator.handle_action(token)?))
}
