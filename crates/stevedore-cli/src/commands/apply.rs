//! `stevedore create` / `stevedore update`

use std::path::PathBuf;

use clap::Args;
use kube::Client;

use stevedore_common::ReleaseConfig;
use stevedore_engine::{Applier, KubeStore, Operation};

use crate::error::Result;

use super::{cancel_on_ctrl_c, render_report};

/// Arguments shared by create and update
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Path to the release document
    #[arg(short, long)]
    pub file: PathBuf,
}

/// Validate the document and apply every declared section to the cluster
pub async fn run(args: ApplyArgs, operation: Operation) -> Result<()> {
    let document = std::fs::read_to_string(&args.file)?;
    let release = ReleaseConfig::parse(&document)
        .and_then(|config| config.validate())
        .map_err(crate::Error::Core)?;

    let client = Client::try_default().await?;
    let store = KubeStore::new(client);
    let cancel = cancel_on_ctrl_c();

    let report = Applier::new(&store).apply(&release, operation, &cancel).await;
    render_report(&report);
    report.into_result().map_err(crate::Error::Core)?;
    Ok(())
}
