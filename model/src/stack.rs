/*!

GitOps stack deployment. A stack under `software/stacks/<name>` is driven by two typed Flux
objects: a stack GitRepository pointing at the GitOps repo, and a `bootstrap-<name>` Kustomization
that applies the stack directory. Everything else the stack deploys comes from Flux reconciling
that bootstrap object.

!*/

use crate::config::Settings;
use crate::constants::{
    BOOTSTRAP_PREFIX, FLUX_NAMESPACE, LABEL_STACK, LABEL_TYPE, SHARED_GIT_REPOSITORY, STACKS_DIR,
};
use crate::flux::{
    ready_condition, stack_short_name, FluxClient, GitRepository, GitRepositoryRef,
    GitRepositorySpec, Kustomization, KustomizationSpec, SourceRef,
};
use crate::manager::ClusterManager;
use crate::tools::FluxCli;
use kube::api::ObjectMeta;
use log::{info, warn};
use maplit::btreemap;
use snafu::{ensure, ResultExt, Snafu};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Unable to {}: {}", action, source))]
    Flux {
        action: String,
        source: crate::flux::Error,
    },

    #[snafu(display("Unable to {}: {}", action, source))]
    Manager {
        action: String,
        source: crate::manager::Error,
    },

    #[snafu(display("Unable to install Flux: {}", source))]
    FluxInstall { source: crate::tools::Error },

    #[snafu(display("Flux is not installed in the cluster and the 'flux' binary is not on PATH"))]
    MissingFluxCli,

    #[snafu(display("Stack '{}' not found. Available stacks: {}", stack, available.join(", ")))]
    UnknownStack { stack: String, available: Vec<String> },
}

/// Deploy a stack: make sure Flux is present, then create or refresh the stack source and its
/// bootstrap kustomization.
pub async fn deploy_stack(
    manager: &ClusterManager,
    settings: &Settings,
    stack: &str,
) -> Result<()> {
    let stack_dir = PathBuf::from(STACKS_DIR).join(stack);
    if !stack_dir.is_dir() {
        return UnknownStackSnafu {
            stack,
            available: available_stacks(),
        }
        .fail();
    }

    if !manager.has_flux().await {
        ensure!(FluxCli::is_installed(), MissingFluxCliSnafu);
        info!("Flux not found, installing it first");
        FluxCli::new(&settings.kubeconfig_path)
            .install()
            .await
            .context(FluxInstallSnafu)?;
    }

    let short = stack_short_name(stack);
    info!("deploying software stack '{}'", stack);

    if stack_uses_components(&stack_dir) {
        let shared = git_repository(SHARED_GIT_REPOSITORY, settings, short);
        manager
            .create_or_update(&shared, "shared GitRepository")
            .await
            .context(ManagerSnafu {
                action: "create the shared GitRepository",
            })?;
    }

    let source_name = format!("{}-{}", SHARED_GIT_REPOSITORY, short);
    let source = git_repository(&source_name, settings, short);
    manager
        .create_or_update(&source, "stack GitRepository")
        .await
        .context(ManagerSnafu {
            action: "create the stack GitRepository",
        })?;

    let bootstrap = bootstrap_kustomization(stack, &source_name);
    manager
        .create_or_update(&bootstrap, "bootstrap Kustomization")
        .await
        .context(ManagerSnafu {
            action: "create the bootstrap Kustomization",
        })?;

    let flux = FluxClient::new_from_k8s_client(manager.k8s_client.clone());
    wait_for_source_sync(&flux).await;

    info!("software stack '{}' deployed", stack);
    Ok(())
}

/// Remove a stack's Flux objects. Flux prunes what they deployed. The shared GitRepository is
/// kept while any component kustomizations from other stacks still reference it.
pub async fn remove_stack(manager: &ClusterManager, stack: &str) -> Result<()> {
    let flux = FluxClient::new_from_k8s_client(manager.k8s_client.clone());
    let short = stack_short_name(stack);
    let selector = format!("{}={}", LABEL_STACK, short);

    let labeled = flux
        .labeled_kustomizations(&selector)
        .await
        .context(FluxSnafu {
            action: "find the stack's kustomizations",
        })?;
    if labeled.is_empty() {
        info!("no kustomizations found for stack '{}', nothing to remove", stack);
        return Ok(());
    }

    let bootstrap = format!("{}{}", BOOTSTRAP_PREFIX, short);
    info!("removing bootstrap kustomization '{}'", bootstrap);
    flux.delete_kustomization(&bootstrap)
        .await
        .context(FluxSnafu {
            action: "remove the bootstrap Kustomization",
        })?;

    for kustomization in labeled {
        let name = kube::ResourceExt::name_any(&kustomization);
        if name == bootstrap {
            continue;
        }
        info!("removing kustomization '{}'", name);
        if let Err(e) = flux.delete_kustomization(&name).await {
            warn!("could not remove kustomization '{}': {}", name, e);
        }
    }

    let source_name = format!("{}-{}", SHARED_GIT_REPOSITORY, short);
    info!("removing stack GitRepository '{}'", source_name);
    flux.delete_git_repository(&source_name)
        .await
        .context(FluxSnafu {
            action: "remove the stack GitRepository",
        })?;

    let component_selector = format!("{}=component", LABEL_TYPE);
    let components = flux
        .labeled_kustomizations(&component_selector)
        .await
        .context(FluxSnafu {
            action: "count remaining component kustomizations",
        })?;
    if components.is_empty() {
        info!("no component kustomizations remaining, removing the shared GitRepository");
        flux.delete_git_repository(SHARED_GIT_REPOSITORY)
            .await
            .context(FluxSnafu {
                action: "remove the shared GitRepository",
            })?;
    } else {
        info!(
            "{} component kustomization(s) remaining, keeping the shared GitRepository",
            components.len()
        );
    }

    info!("stack '{}' removal initiated, Flux completes the cleanup", stack);
    Ok(())
}

fn git_repository(name: &str, settings: &Settings, stack: &str) -> GitRepository {
    let mut repo = GitRepository::new(
        name,
        GitRepositorySpec {
            url: settings.gitops_repo.clone(),
            interval: "1m".to_string(),
            reference: Some(GitRepositoryRef {
                branch: Some(settings.gitops_branch.clone()),
                tag: None,
            }),
            suspend: None,
        },
    );
    repo.metadata = ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(FLUX_NAMESPACE.to_string()),
        labels: Some(btreemap! {
            LABEL_STACK.to_string() => stack.to_string()
        }),
        ..Default::default()
    };
    repo
}

fn bootstrap_kustomization(stack: &str, source_name: &str) -> Kustomization {
    let short = stack_short_name(stack);
    let name = format!("{}{}", BOOTSTRAP_PREFIX, short);
    let mut kustomization = Kustomization::new(
        &name,
        KustomizationSpec {
            interval: "1m".to_string(),
            path: Some(format!("./{}/{}", STACKS_DIR, stack)),
            prune: true,
            source_ref: SourceRef {
                kind: "GitRepository".to_string(),
                name: source_name.to_string(),
                namespace: None,
            },
            suspend: None,
            depends_on: None,
            target_namespace: Some(FLUX_NAMESPACE.to_string()),
            wait: Some(false),
            timeout: Some("5m".to_string()),
        },
    );
    kustomization.metadata = ObjectMeta {
        name: Some(name),
        namespace: Some(FLUX_NAMESPACE.to_string()),
        labels: Some(btreemap! {
            LABEL_STACK.to_string() => short.to_string()
        }),
        ..Default::default()
    };
    kustomization
}

fn stack_uses_components(stack_dir: &Path) -> bool {
    let stack_yaml = stack_dir.join("stack.yaml");
    std::fs::read_to_string(stack_yaml)
        .map(|content| content.contains("./software/components/"))
        .unwrap_or(false)
}

fn available_stacks() -> Vec<String> {
    let mut stacks = Vec::new();
    if let Ok(entries) = std::fs::read_dir(STACKS_DIR) {
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                stacks.push(entry.file_name().to_string_lossy().to_string());
            }
        }
    }
    stacks.sort();
    stacks
}

/// Poll until some GitRepository reports Ready, giving up quietly after a minute.
async fn wait_for_source_sync(flux: &FluxClient) {
    info!("waiting for GitRepository to sync");
    for _ in 0..30 {
        if let Ok(repos) = flux.git_repositories().await {
            let synced = repos.iter().any(|repo| {
                repo.status
                    .as_ref()
                    .and_then(|status| ready_condition(status.conditions.as_ref()))
                    .map(|c| c.status == "True")
                    .unwrap_or(false)
            });
            if synced {
                info!("GitRepository synced");
                return;
            }
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    warn!("GitRepository sync timed out, continuing");
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Settings;

    #[test]
    fn bootstrap_object_shape() {
        let kustomization = bootstrap_kustomization("extension/sample", "flux-system-sample");
        assert_eq!(
            kustomization.metadata.name.as_deref(),
            Some("bootstrap-sample")
        );
        assert_eq!(
            kustomization.spec.path.as_deref(),
            Some("./software/stacks/extension/sample")
        );
        assert_eq!(kustomization.spec.source_ref.name, "flux-system-sample");
        let labels = kustomization.metadata.labels.unwrap();
        assert_eq!(labels.get(LABEL_STACK).unwrap(), "sample");
    }

    #[test]
    fn git_repository_points_at_gitops_repo() {
        let settings = Settings::default();
        let repo = git_repository("flux-system-sample", &settings, "sample");
        assert_eq!(repo.spec.url, settings.gitops_repo);
        assert_eq!(
            repo.spec.reference.unwrap().branch.unwrap(),
            settings.gitops_branch
        );
    }
}
