use anyhow::{Context, Result};
use clap::Parser;
use model::manager::cluster_restart;
use model::Settings;

/// Delete the cluster, then create it again with the same configuration.
#[derive(Debug, Parser)]
pub(crate) struct Restart {
    /// Name of the kind config to use for the new cluster.
    config: Option<String>,
}

impl Restart {
    pub(crate) async fn run(self, settings: &Settings) -> Result<()> {
        cluster_restart(settings, self.config.as_deref())
            .await
            .context("Unable to restart the cluster")?;
        println!("Cluster '{}' is ready.", settings.cluster_name);
        Ok(())
    }
}
