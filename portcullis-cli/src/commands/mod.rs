//! Command handlers -- one module per subcommand

pub mod config;
pub mod group;
pub mod lookup;
pub mod overlaps;

use std::path::Path;

use tracing::info;

use portcullis_core::config::PortcullisConfig;
use portcullis_port_grouping::{SignatureLoader, SignatureSet};

use crate::cli::TargetArgs;
use crate::error::CliError;

/// Load the signature inventory named by `--signatures`, falling back to
/// `signatures.path` from the configuration.
pub async fn load_signatures(
    target: &TargetArgs,
    config: &PortcullisConfig,
) -> Result<SignatureSet, CliError> {
    let path = target
        .signatures
        .as_deref()
        .unwrap_or_else(|| Path::new(&config.signatures.path));

    info!(path = %path.display(), "loading signature inventory");
    let signatures = SignatureLoader::new(config.signatures.max_signatures)
        .load_file(path)
        .await?;
    Ok(signatures)
}
