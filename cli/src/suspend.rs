use anyhow::{Context, Result};
use clap::Parser;
use model::flux::FluxClient;
use model::manager::ClusterManager;

/// Suspend GitOps reconciliation of every GitRepository source.
#[derive(Debug, Parser)]
pub(crate) struct Suspend {}

impl Suspend {
    pub(crate) async fn run(self, manager: ClusterManager) -> Result<()> {
        let flux = FluxClient::new_from_k8s_client(manager.k8s_client.clone());
        let count = flux
            .suspend_all()
            .await
            .context("Unable to suspend GitOps sources")?;
        println!("Suspended {} GitOps source(s).", count);
        Ok(())
    }
}
