use anyhow::{Context, Result};
use clap::Parser;
use model::flux::FluxClient;
use model::manager::ClusterManager;

/// Resume GitOps reconciliation of every GitRepository source.
#[derive(Debug, Parser)]
pub(crate) struct Resume {}

impl Resume {
    pub(crate) async fn run(self, manager: ClusterManager) -> Result<()> {
        let flux = FluxClient::new_from_k8s_client(manager.k8s_client.clone());
        let count = flux
            .resume_all()
            .await
            .context("Unable to resume GitOps sources")?;
        println!("Resumed {} GitOps source(s).", count);
        Ok(())
    }
}
