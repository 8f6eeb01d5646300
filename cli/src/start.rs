use anyhow::{Context, Result};
use clap::Parser;
use model::manager::cluster_up;
use model::Settings;

/// Create the kind cluster, wait for its nodes, and install the enabled addons.
#[derive(Debug, Parser)]
pub(crate) struct Start {
    /// Name of the kind config to use (`kind-<name>.yaml` under infra/kubernetes). Overrides the
    /// KIND_CONFIG environment variable.
    config: Option<String>,
}

impl Start {
    pub(crate) async fn run(self, settings: &Settings) -> Result<()> {
        cluster_up(settings, self.config.as_deref())
            .await
            .context("Unable to start the cluster")?;
        println!("Cluster '{}' is ready.", settings.cluster_name);
        Ok(())
    }
}
