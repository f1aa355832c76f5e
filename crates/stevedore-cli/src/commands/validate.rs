//! `stevedore validate`

use std::path::PathBuf;

use clap::Args;

use stevedore_common::ReleaseConfig;

use crate::error::Result;

/// Arguments for validate
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the release document
    #[arg(short, long)]
    pub file: PathBuf,
}

/// Parse and validate a document without touching the cluster.
///
/// Violations are aggregated, so one run reports everything wrong with the
/// document.
pub async fn run(args: ValidateArgs) -> Result<()> {
    let document = std::fs::read_to_string(&args.file)?;
    let release = ReleaseConfig::parse(&document)
        .and_then(|config| config.validate())
        .map_err(crate::Error::Core)?;

    println!(
        "release '{}' in namespace '{}' is valid",
        release.name(),
        release.namespace()
    );
    Ok(())
}
