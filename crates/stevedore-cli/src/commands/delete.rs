//! `stevedore delete`

use clap::Args;
use kube::Client;
use tracing::warn;

use stevedore_common::release_selector;
use stevedore_engine::{Applier, KubeStore, ResourceKind, ResourceStore};

use crate::error::Result;

use super::{cancel_on_ctrl_c, render_report};

/// Arguments for delete
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Release name
    pub name: String,

    /// Release namespace
    #[arg(short, long)]
    pub namespace: String,

    /// After deletion, list any objects still matching the release's label
    /// selector
    #[arg(long)]
    pub verify: bool,
}

/// Tear down a release using its persisted snapshot
pub async fn run(args: DeleteArgs) -> Result<()> {
    let client = Client::try_default().await?;
    let store = KubeStore::new(client);
    let cancel = cancel_on_ctrl_c();

    let report = Applier::new(&store)
        .delete(&args.name, &args.namespace, &cancel)
        .await;
    render_report(&report);

    if args.verify {
        verify_teardown(&store, &args.name, &args.namespace).await?;
    }

    report.into_result().map_err(crate::Error::Core)?;
    Ok(())
}

/// List leftover objects under the release's label selector
async fn verify_teardown(store: &KubeStore, release: &str, namespace: &str) -> Result<()> {
    let selector = release_selector(release);
    let mut leftovers = 0;
    for kind in [
        ResourceKind::Workload,
        ResourceKind::Service,
        ResourceKind::Ingress,
        ResourceKind::SecretFile,
        ResourceKind::ConfigFile,
        ResourceKind::ScheduledJob,
    ] {
        let names = store
            .list_names(kind, namespace, &selector)
            .await
            .map_err(crate::Error::Core)?;
        for name in names {
            warn!(kind = %kind, name = %name, "object still present after delete");
            println!("  leftover {kind} '{name}'");
            leftovers += 1;
        }
    }
    if leftovers == 0 {
        println!("  no objects left under selector '{selector}'");
    }
    Ok(())
}
