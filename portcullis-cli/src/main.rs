//! Portcullis CLI -- build and inspect signature port groups.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::warn;

use portcullis_core::config::PortcullisConfig;
use portcullis_core::error::{ConfigError, PortcullisError};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            use colored::Colorize;
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let loaded = PortcullisConfig::load(&cli.config).await;

    // Logging comes up with defaults even when the config is broken.
    let mut general = match &loaded {
        Ok(config) => config.general.clone(),
        Err(_) => PortcullisConfig::default().general,
    };
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    logging::init_tracing(&general)?;
    portcullis_core::metrics::describe_all();

    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
        Commands::Group(args) => {
            let config = resolve_config(loaded, &cli.config)?;
            commands::group::execute(args, &config, &writer).await
        }
        Commands::Lookup(args) => {
            let config = resolve_config(loaded, &cli.config)?;
            commands::lookup::execute(args, &config, &writer).await
        }
        Commands::Overlaps(args) => {
            let config = resolve_config(loaded, &cli.config)?;
            commands::overlaps::execute(args, &config, &writer).await
        }
    }
}

/// A missing configuration file falls back to defaults (plus env overrides).
/// Any other load failure is fatal.
fn resolve_config(
    loaded: Result<PortcullisConfig, PortcullisError>,
    path: &Path,
) -> Result<PortcullisConfig, CliError> {
    match loaded {
        Ok(config) => Ok(config),
        Err(PortcullisError::Config(ConfigError::FileNotFound { .. })) => {
            warn!(path = %path.display(), "config file not found, using defaults");
            let mut config = PortcullisConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_config_missing_file_uses_defaults() {
        let missing = Err(PortcullisError::Config(ConfigError::FileNotFound {
            path: "nope.toml".to_owned(),
        }));
        let config = resolve_config(missing, Path::new("nope.toml")).expect("defaults");
        assert_eq!(config.grouping.profile, "medium");
    }

    #[test]
    fn test_resolve_config_parse_failure_is_fatal() {
        let broken = Err(PortcullisError::Config(ConfigError::ParseFailed {
            reason: "expected `]`".to_owned(),
        }));
        let err = resolve_config(broken, Path::new("bad.toml")).expect_err("must fail");
        assert_eq!(err.exit_code(), 2);
    }
}
