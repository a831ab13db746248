//! `anyrun query` - one aggregation pass

use anyhow::Result;
use anyrun_core::{AggregatedResultSet, QueryScope, Registry};
use clap::Args;
use std::fmt::Write;
use tokio_util::sync::CancellationToken;

use crate::config::AnyrunConfig;

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Text to search for
    pub input: String,

    /// Only ask this plugin
    #[arg(long, value_name = "NAME")]
    pub plugin: Option<String>,

    /// Print the result set as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryArgs {
    fn scope(&self) -> QueryScope {
        self.plugin
            .clone()
            .map_or(QueryScope::All, QueryScope::Plugin)
    }
}

pub async fn run(args: QueryArgs, config: &AnyrunConfig) -> Result<()> {
    let (aggregator, _report) = super::start(config)?;

    let scope = args.scope();
    if let QueryScope::Plugin(name) = &scope
        && !aggregator.registry().contains(name)
    {
        tracing::warn!(plugin = %name, "No such plugin loaded");
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let Some(results) = aggregator.query_scoped(&args.input, &scope, &cancel).await else {
        anyhow::bail!("Query interrupted");
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.is_empty() {
        println!("No matches for '{}'", results.input);
    } else {
        print!("{}", render(&results, aggregator.registry()));
    }

    Ok(())
}

/// Numbered, human-readable listing of a result set
pub fn render(results: &AggregatedResultSet, registry: &Registry) -> String {
    let mut out = String::new();
    for (i, m) in results.iter().enumerate() {
        let label = registry
            .get(&m.plugin)
            .map_or(m.plugin.as_str(), |p| p.descriptor().label.as_str());
        let marker = if m.opens.is_some() {
            " (open)"
        } else if m.token.is_some() {
            ""
        } else {
            " (no action)"
        };

        let _ = writeln!(out, "{:>3}. [{}] {}{}", i + 1, label, m.entry.title, marker);
        if let Some(description) = &m.entry.description {
            let _ = writeln!(out, "       {description}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyrun_core::AggregatedMatch;
    use anyrun_plugin_api::Match;

    #[test]
    fn test_query_args_parsing() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            args: QueryArgs,
        }

        let cli = TestCli::parse_from(["test", "fire"]);
        assert_eq!(cli.args.input, "fire");
        assert_eq!(cli.args.scope(), QueryScope::All);
        assert!(!cli.args.json);

        let cli = TestCli::parse_from(["test", "ls -la", "--plugin", "shell", "--json"]);
        assert_eq!(cli.args.scope(), QueryScope::Plugin("shell".to_string()));
        assert!(cli.args.json);
    }

    #[test]
    fn test_render_numbers_matches_from_one() {
        let results = AggregatedResultSet {
            input: "ssh".to_string(),
            matches: vec![
                AggregatedMatch {
                    plugin: "ssh".to_string(),
                    entry: Match::new("nas").with_description("admin@192.168.1.20:2222"),
                    token: None,
                    opens: None,
                },
                AggregatedMatch {
                    plugin: "shell".to_string(),
                    entry: Match::new("ssh"),
                    token: None,
                    opens: None,
                },
            ],
        };

        let rendered = render(&results, &Registry::default());
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "  1. [ssh] nas (no action)");
        assert_eq!(lines[1], "       admin@192.168.1.20:2222");
        assert_eq!(lines[2], "  2. [shell] ssh (no action)");
    }

    #[test]
    fn test_render_marks_open_entries() {
        let results = AggregatedResultSet {
            input: "ss".to_string(),
            matches: vec![AggregatedMatch {
                plugin: "ssh".to_string(),
                entry: Match::new("SSH").with_description("Plugin"),
                token: None,
                opens: Some("ssh".to_string()),
            }],
        };

        let rendered = render(&results, &Registry::default());
        assert_eq!(rendered.lines().next(), Some("  1. [ssh] SSH (open)"));
    }

    #[test]
    fn test_json_output_flattens_match_fields() {
        let results = AggregatedResultSet {
            input: "x".to_string(),
            matches: vec![AggregatedMatch {
                plugin: "shell".to_string(),
                entry: Match::new("x").with_score(3),
                token: None,
                opens: None,
            }],
        };

        let json: serde_json::Value = serde_json::to_value(&results).unwrap();
        assert_eq!(json["input"], "x");
        assert_eq!(json["matches"][0]["plugin"], "shell");
        assert_eq!(json["matches"][0]["title"], "x");
        assert_eq!(json["matches"][0]["score"], 3);
    }
}
