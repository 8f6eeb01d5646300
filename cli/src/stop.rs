use anyhow::{Context, Result};
use clap::Parser;
use model::manager::cluster_down;
use model::Settings;

/// Delete the kind cluster and the local registry container. Succeeds when the cluster does not
/// exist, so `stop` is always safe to run.
#[derive(Debug, Parser)]
pub(crate) struct Stop {}

impl Stop {
    pub(crate) async fn run(self, settings: &Settings) -> Result<()> {
        cluster_down(settings)
            .await
            .context("Unable to stop the cluster")?;
        println!("Cluster '{}' removed.", settings.cluster_name);
        Ok(())
    }
}
