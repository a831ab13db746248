use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "anyrun", about = "Query anyrun plugins from the terminal")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    overrides: config::Overrides,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load plugins and show what was found
    Plugins(commands::plugins::PluginsArgs),
    /// Run a single query against the loaded plugins
    Query(commands::query::QueryArgs),
    /// Read queries from stdin, one per line
    Session(commands::session::SessionArgs),
}

/// How long shutdown waits for blocking plugin workers once a command is done
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = config::ConfigLoader::load()?.with_overrides(&cli.overrides);

    run_to_completion(async move {
        match cli.command {
            Commands::Plugins(args) => commands::plugins::run(args, &config),
            Commands::Query(args) => commands::query::run(args, &config).await,
            Commands::Session(args) => commands::session::run(args, &config).await,
        }
    })
}

/// Drive `command` on a fresh runtime.
///
/// A plugin that ignored its query timeout still occupies a blocking
/// thread; shutdown gives such threads [`SHUTDOWN_GRACE`] and then leaves
/// them behind so the process can exit.
fn run_to_completion<F>(command: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    let runtime = tokio::runtime::Runtime::new().context("Failed to start the async runtime")?;
    let result = runtime.block_on(command);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}
