pub mod plugins;
pub mod query;
pub mod session;

use anyhow::{Context, Result};
use anyrun_core::{Aggregator, LoadOutcome, LoadReport, PluginLoader, StartupEnvironment};

use crate::config::AnyrunConfig;

/// Capture the environment, load every plugin and build the aggregator
pub fn start(config: &AnyrunConfig) -> Result<(Aggregator, LoadReport)> {
    let env = StartupEnvironment::capture();
    let loader = PluginLoader::new();

    let (aggregator, report) = anyrun_core::plugins::start(
        &env,
        config.plugins.fallback_dir.as_deref(),
        &loader,
        config.plugins.aggregator_config()?,
    )
    .context("Cannot locate plugins; set ANYRUN_PLUGINS or plugins.fallback_dir in config.toml")?;

    for outcome in report.rejected() {
        tracing::warn!(path = %outcome.path().display(), "{}", describe(outcome));
    }

    Ok((aggregator, report))
}

/// One-line summary of a load outcome
pub fn describe(outcome: &LoadOutcome) -> String {
    match outcome {
        LoadOutcome::Loaded { descriptor, .. } => format!("loaded as '{}'", descriptor.name),
        LoadOutcome::Incompatible { reason, .. } => format!("incompatible: {reason}"),
        LoadOutcome::Failed { cause, .. } => format!("failed: {cause}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyrun_core::{BindError, LoadError, LoadStage, PluginDescriptor};
    use std::path::PathBuf;

    #[test]
    fn test_describe_outcomes() {
        let path = PathBuf::from("/plugins/libx.so");

        let loaded = LoadOutcome::Loaded {
            path: path.clone(),
            descriptor: PluginDescriptor {
                name: "shell".to_string(),
                label: "Terminal".to_string(),
                icon: None,
                version: "0.1.0".to_string(),
                description: String::new(),
                origin: path.clone(),
            },
        };
        assert_eq!(describe(&loaded), "loaded as 'shell'");

        let incompatible = LoadOutcome::Incompatible {
            path: path.clone(),
            reason: BindError::ApiVersionMismatch {
                expected: 1,
                found: 7,
            },
        };
        assert!(describe(&incompatible).starts_with("incompatible: API version mismatch"));

        let failed = LoadOutcome::Failed {
            path,
            cause: LoadError::Panicked {
                stage: LoadStage::Init,
            },
        };
        assert!(describe(&failed).starts_with("failed: Plugin panicked"));
    }
}
