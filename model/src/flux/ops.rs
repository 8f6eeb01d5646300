use super::crd::{GitRepository, Kustomization};
use super::error::{FluxNotInstalledSnafu, KubeSnafu, Result, SuspendFailedSnafu, SyncFailedSnafu};
use crate::constants::{
    BOOTSTRAP_PREFIX, FLUX_NAMESPACE, RECONCILE_ANNOTATION, SHARED_GIT_REPOSITORY, STACK_SUFFIX,
};
use chrono::Utc;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use log::{info, warn};
use serde_json::json;
use snafu::{ensure, ResultExt};

/// A client for the Flux custom resources in the `flux-system` namespace. Reconciliation is
/// requested the same way the flux CLI does it, by stamping the `reconcile.fluxcd.io/requestedAt`
/// annotation; suspend and resume are merge patches on `spec.suspend`.
pub struct FluxClient {
    git_repositories: Api<GitRepository>,
    kustomizations: Api<Kustomization>,
}

impl FluxClient {
    pub fn new_from_k8s_client(k8s_client: Client) -> Self {
        Self {
            git_repositories: Api::namespaced(k8s_client.clone(), FLUX_NAMESPACE),
            kustomizations: Api::namespaced(k8s_client, FLUX_NAMESPACE),
        }
    }

    pub async fn git_repositories(&self) -> Result<Vec<GitRepository>> {
        Ok(self
            .git_repositories
            .list(&ListParams::default())
            .await
            .context(KubeSnafu {
                action: "list GitRepositories",
            })?
            .items)
    }

    pub async fn kustomizations(&self) -> Result<Vec<Kustomization>> {
        Ok(self
            .kustomizations
            .list(&ListParams::default())
            .await
            .context(KubeSnafu {
                action: "list Kustomizations",
            })?
            .items)
    }

    pub async fn labeled_kustomizations(&self, selector: &str) -> Result<Vec<Kustomization>> {
        let params = ListParams {
            label_selector: Some(selector.to_string()),
            ..Default::default()
        };
        Ok(self
            .kustomizations
            .list(&params)
            .await
            .context(KubeSnafu {
                action: format!("list Kustomizations with '{}'", selector),
            })?
            .items)
    }

    /// Request reconciliation of a GitRepository source.
    pub async fn reconcile_source(&self, name: &str) -> Result<()> {
        info!("syncing source '{}'", name);
        annotate_requested_at(&self.git_repositories, name, "GitRepository").await
    }

    /// Request reconciliation of a Kustomization, optionally syncing its source first.
    pub async fn reconcile_kustomization(&self, name: &str, with_source: bool) -> Result<()> {
        if with_source {
            if let Ok(kustomization) = self.kustomizations.get(name).await {
                let source = kustomization.spec.source_ref.name.clone();
                if let Err(e) = self.reconcile_source(&source).await {
                    warn!("could not sync source '{}': {}", source, e);
                }
            }
        }
        info!("syncing kustomization '{}'", name);
        annotate_requested_at(&self.kustomizations, name, "Kustomization").await
    }

    /// Sync one stack: the shared source first, then its bootstrap kustomization.
    pub async fn sync_stack(&self, stack: &str) -> Result<()> {
        info!("syncing stack '{}'", stack);
        self.reconcile_source(SHARED_GIT_REPOSITORY).await?;
        let bootstrap = format!("{}{}", BOOTSTRAP_PREFIX, stack_short_name(stack));
        self.reconcile_kustomization(&bootstrap, true).await
    }

    /// Sync every GitRepository, then every stack kustomization. Partial failures are collected
    /// and reported together at the end.
    pub async fn sync_all(&self) -> Result<()> {
        let mut failed = Vec::new();

        for repo in self.git_repositories().await? {
            let name = repo.name_any();
            if let Err(e) = self.reconcile_source(&name).await {
                warn!("failed to sync source '{}': {}", name, e);
                failed.push(name);
            }
        }
        for kustomization in self.kustomizations().await? {
            let name = kustomization.name_any();
            if !is_stack_kustomization(&name) {
                continue;
            }
            if let Err(e) = self.reconcile_kustomization(&name, true).await {
                warn!("failed to sync kustomization '{}': {}", name, e);
                failed.push(name);
            }
        }

        ensure!(failed.is_empty(), SyncFailedSnafu { failed });
        info!("all sources and stack kustomizations synced");
        Ok(())
    }

    /// Suspend every GitRepository source, pausing GitOps reconciliation.
    pub async fn suspend_all(&self) -> Result<usize> {
        self.set_suspend_all(true).await
    }

    /// Resume every GitRepository source.
    pub async fn resume_all(&self) -> Result<usize> {
        self.set_suspend_all(false).await
    }

    async fn set_suspend_all(&self, suspend: bool) -> Result<usize> {
        let action = if suspend { "suspend" } else { "resume" };
        let repos = self.git_repositories().await?;
        ensure!(!repos.is_empty(), FluxNotInstalledSnafu);

        let mut changed = 0;
        let mut failed = Vec::new();
        for repo in repos {
            let name = repo.name_any();
            let patch = json!({ "spec": { "suspend": suspend } });
            match self
                .git_repositories
                .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
                .await
            {
                Ok(_) => {
                    info!("{}d source '{}'", action, name);
                    changed += 1;
                }
                Err(e) => {
                    warn!("failed to {} '{}': {}", action, name, e);
                    failed.push(name);
                }
            }
        }

        ensure!(failed.is_empty(), SuspendFailedSnafu { action, failed });
        Ok(changed)
    }

    pub async fn delete_kustomization(&self, name: &str) -> Result<()> {
        delete_ignore_missing(&self.kustomizations, name, "Kustomization").await
    }

    pub async fn delete_git_repository(&self, name: &str) -> Result<()> {
        delete_ignore_missing(&self.git_repositories, name, "GitRepository").await
    }
}

async fn annotate_requested_at<T>(api: &Api<T>, name: &str, what: &str) -> Result<()>
where
    T: kube::Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
    <T as kube::Resource>::DynamicType: Default,
{
    let patch = json!({
        "metadata": {
            "annotations": { RECONCILE_ANNOTATION: Utc::now().to_rfc3339() }
        }
    });
    api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
        .context(KubeSnafu {
            action: format!("annotate {} '{}'", what, name),
        })?;
    Ok(())
}

async fn delete_ignore_missing<T>(api: &Api<T>, name: &str, what: &str) -> Result<()>
where
    T: kube::Resource + Clone + serde::de::DeserializeOwned + std::fmt::Debug,
    <T as kube::Resource>::DynamicType: Default,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
        Err(e) => Err(e).context(KubeSnafu {
            action: format!("delete {} '{}'", what, name),
        }),
    }
}

/// Stack kustomizations are the bootstrap object and anything named after a stack.
pub(crate) fn is_stack_kustomization(name: &str) -> bool {
    name.starts_with(BOOTSTRAP_PREFIX) || name.ends_with(STACK_SUFFIX)
}

/// Stacks can be referenced by path (`extension/sample`); labels and object names use the last
/// path segment.
pub(crate) fn stack_short_name(stack: &str) -> &str {
    stack.rsplit('/').next().unwrap_or(stack)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stack_kustomization_names() {
        assert!(is_stack_kustomization("bootstrap-sample"));
        assert!(is_stack_kustomization("sample-stack"));
        assert!(!is_stack_kustomization("component-ingress"));
    }

    #[test]
    fn short_name_strips_path() {
        assert_eq!(stack_short_name("extension/sample"), "sample");
        assert_eq!(stack_short_name("sample"), "sample");
    }
}
