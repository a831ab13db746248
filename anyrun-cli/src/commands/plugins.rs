//! `anyrun plugins` - show the registry and the load log

use anyhow::Result;
use anyrun_core::{LoadOutcome, LoadReport, Registry};
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use crate::config::AnyrunConfig;

#[derive(Args, Debug)]
pub struct PluginsArgs {
    /// Also list every candidate file and what happened to it
    #[arg(long)]
    pub log: bool,
}

pub fn run(args: PluginsArgs, config: &AnyrunConfig) -> Result<()> {
    let (aggregator, report) = super::start(config)?;
    let registry = aggregator.registry();

    if registry.is_empty() {
        println!("No plugins loaded");
        println!();
        println!("anyrun looks for plugin libraries in the directories listed in ANYRUN_PLUGINS,");
        println!("for example: export ANYRUN_PLUGINS=\"$HOME/.local/lib/anyrun\"");
    } else {
        println!("{}", registry_table(registry));
    }

    for skipped in &report.skipped_dirs {
        println!("Skipped {}: {}", skipped.path.display(), skipped.reason);
    }

    let rejected = report.rejected().count();
    if args.log {
        println!();
        println!("{}", outcome_table(&report));
    } else if rejected > 0 {
        println!();
        println!("{rejected} candidate(s) rejected; run 'anyrun plugins --log' for details");
    }

    Ok(())
}

fn registry_table(registry: &Registry) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Name", "Label", "Version", "Origin"]);

    for plugin in registry.iter() {
        let d = plugin.descriptor();
        let name = if plugin.is_failed() {
            Cell::new(format!("{} (failed)", d.name)).fg(Color::Red)
        } else {
            Cell::new(&d.name)
        };
        table.add_row(vec![
            name,
            Cell::new(&d.label),
            Cell::new(&d.version),
            Cell::new(d.origin.display()),
        ]);
    }
    table
}

fn outcome_table(report: &LoadReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Candidate", "Outcome"]);

    for outcome in &report.outcomes {
        let color = match outcome {
            LoadOutcome::Loaded { .. } => Color::Green,
            LoadOutcome::Incompatible { .. } => Color::Yellow,
            LoadOutcome::Failed { .. } => Color::Red,
        };
        table.add_row(vec![
            Cell::new(outcome.path().display()),
            Cell::new(super::describe(outcome)).fg(color),
        ]);
    }
    table
}
