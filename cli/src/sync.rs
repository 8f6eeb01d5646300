use anyhow::{Context, Result};
use clap::Parser;
use model::flux::FluxClient;
use model::manager::ClusterManager;

/// Trigger Flux reconciliation. With no arguments every source and stack kustomization is
/// reconciled; `--stack` narrows the sync to one stack's source and bootstrap.
#[derive(Debug, Parser)]
pub(crate) struct Sync {
    /// Sync only this stack's GitRepository and bootstrap kustomization.
    #[clap(long = "stack")]
    stack: Option<String>,

    /// Reconcile a single GitRepository by name.
    #[clap(long = "repo", conflicts_with = "stack")]
    repo: Option<String>,

    /// Reconcile a single Kustomization by name.
    #[clap(long = "kustomization", conflicts_with_all = &["stack", "repo"])]
    kustomization: Option<String>,

    /// When reconciling a kustomization, reconcile its source first.
    #[clap(long = "with-source", requires = "kustomization")]
    with_source: bool,
}

impl Sync {
    pub(crate) async fn run(self, manager: ClusterManager) -> Result<()> {
        let flux = FluxClient::new_from_k8s_client(manager.k8s_client.clone());

        if let Some(stack) = &self.stack {
            flux.sync_stack(stack)
                .await
                .context(format!("Unable to sync stack '{}'", stack))?;
            println!("Requested reconciliation of stack '{}'.", stack);
        } else if let Some(repo) = &self.repo {
            flux.reconcile_source(repo)
                .await
                .context(format!("Unable to reconcile source '{}'", repo))?;
            println!("Requested reconciliation of source '{}'.", repo);
        } else if let Some(kustomization) = &self.kustomization {
            flux.reconcile_kustomization(kustomization, self.with_source)
                .await
                .context(format!(
                    "Unable to reconcile kustomization '{}'",
                    kustomization
                ))?;
            println!(
                "Requested reconciliation of kustomization '{}'.",
                kustomization
            );
        } else {
            flux.sync_all().await.context("Unable to sync")?;
            println!("Requested reconciliation of all sources and stack kustomizations.");
        }
        Ok(())
    }
}
