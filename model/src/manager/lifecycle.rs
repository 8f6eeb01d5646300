//! Cluster lifecycle: bring the kind cluster up with its add-ons, tear it down, restart it.

use super::error::{
    ClusterExistsSnafu, DockerNotRunningSnafu, IoSnafu, KindConfigMissingSnafu, MissingToolSnafu,
    Result, ToolSnafu,
};
use super::ClusterManager;
use crate::addons;
use crate::config::Settings;
use crate::constants::REGISTRY_CONTAINER;
use crate::tools::{self, Docker, Kind, Kubectl};
use log::{debug, info, warn};
use snafu::{ensure, ResultExt};
use std::path::PathBuf;
use std::time::Duration;

const KIND_CONFIG_DIR: &str = "infra/kubernetes";
const NODE_READY_TIMEOUT: Duration = Duration::from_secs(300);

/// Create the kind cluster and everything it needs: registry container, nodes, the `hostk8s`
/// namespace, and the enabled add-ons. Fails fast when the cluster already exists. If cluster
/// creation fails partway, the partial cluster and its kubeconfig are cleaned up.
pub async fn cluster_up(settings: &Settings, config_arg: Option<&str>) -> Result<()> {
    check_dependencies()?;

    let docker = Docker;
    ensure!(docker.is_running().await, DockerNotRunningSnafu);
    docker.warn_on_low_resources().await;

    let exists = Kind
        .cluster_exists(&settings.cluster_name)
        .await
        .context(ToolSnafu {
            context: "check for an existing cluster",
        })?;
    ensure!(
        !exists,
        ClusterExistsSnafu {
            cluster_name: settings.cluster_name.clone(),
        }
    );

    let kind_config = resolve_kind_config(settings, config_arg)?;

    // The registry container comes up before the cluster so kind's docker network can be
    // connected to it afterwards.
    if settings.registry_enabled {
        if let Err(e) = start_registry(settings, &docker).await {
            warn!("registry container setup failed, continuing: {}", e);
        }
    }

    if let Err(e) = create_and_configure(settings, kind_config.as_deref()).await {
        warn!("cluster setup failed, cleaning up partial cluster");
        if let Err(cleanup) = Kind.delete_cluster(&settings.cluster_name).await {
            warn!("could not delete partial cluster: {}", cleanup);
        }
        if settings.kubeconfig_path.exists() {
            if let Err(cleanup) = tokio::fs::remove_file(&settings.kubeconfig_path).await {
                warn!("could not remove generated kubeconfig: {}", cleanup);
            }
        }
        return Err(e);
    }

    info!("cluster '{}' is ready", settings.cluster_name);
    Ok(())
}

/// Delete the cluster and the registry container. A nonexistent cluster is a successful no-op.
/// The kubeconfig file is preserved so a later `start` reuses its path.
pub async fn cluster_down(settings: &Settings) -> Result<()> {
    let exists = Kind
        .cluster_exists(&settings.cluster_name)
        .await
        .context(ToolSnafu {
            context: "check for an existing cluster",
        })?;
    if !exists {
        warn!("cluster '{}' does not exist", settings.cluster_name);
        return Ok(());
    }

    info!("deleting cluster '{}'", settings.cluster_name);
    Kind.delete_cluster(&settings.cluster_name)
        .await
        .context(ToolSnafu {
            context: "delete the cluster",
        })?;

    if let Err(e) = Docker.remove_container(REGISTRY_CONTAINER).await {
        warn!("could not remove registry container: {}", e);
    }
    Ok(())
}

pub async fn cluster_restart(settings: &Settings, config_arg: Option<&str>) -> Result<()> {
    cluster_down(settings).await?;
    cluster_up(settings, config_arg).await
}

async fn create_and_configure(
    settings: &Settings,
    kind_config: Option<&std::path::Path>,
) -> Result<()> {
    Kind.create_cluster(settings, kind_config)
        .await
        .context(ToolSnafu {
            context: "create the cluster",
        })?;

    // Context switch is cosmetic for other terminals; failure is not fatal.
    let kubectl = Kubectl::new(&settings.kubeconfig_path);
    if let Err(e) = kubectl.use_context(&settings.kube_context()).await {
        debug!("could not switch kubectl context: {}", e);
    }

    let manager = ClusterManager::new_from_kubeconfig_path(&settings.kubeconfig_path).await?;
    manager.wait_for_nodes_ready(NODE_READY_TIMEOUT).await?;
    manager.create_namespace().await?;

    addons::install_enabled(&manager, settings).await;
    Ok(())
}

fn check_dependencies() -> Result<()> {
    for tool in ["docker", "kind", "kubectl", "helm"] {
        ensure!(tools::is_installed(tool), MissingToolSnafu { tool });
    }
    Ok(())
}

async fn start_registry(settings: &Settings, docker: &Docker) -> Result<()> {
    if docker.container_exists(REGISTRY_CONTAINER).await {
        let state = docker
            .container_state(REGISTRY_CONTAINER)
            .await
            .context(ToolSnafu {
                context: "inspect the registry container",
            })?;
        if state == "running" {
            info!("registry container already running");
            return Ok(());
        }
        info!("registry container exists but is '{}', recreating", state);
        docker
            .remove_container(REGISTRY_CONTAINER)
            .await
            .context(ToolSnafu {
                context: "remove the stale registry container",
            })?;
    }

    let data_dir = PathBuf::from("data/registry/docker");
    tokio::fs::create_dir_all(&data_dir).await.context(IoSnafu {
        action: "create the registry data directory",
    })?;
    docker
        .run_registry(settings.registry_port, &data_dir)
        .await
        .context(ToolSnafu {
            context: "start the registry container",
        })?;
    info!("registry container started");
    Ok(())
}

/// Pick the kind configuration file. An explicit name is looked up under
/// `infra/kubernetes/` (extension configs first), then the `KIND_CONFIG` setting, then the
/// defaults `kind-config.yaml` and `kind-custom.yaml`. No file means kind's own defaults.
fn resolve_kind_config(settings: &Settings, config_arg: Option<&str>) -> Result<Option<PathBuf>> {
    let config_dir = PathBuf::from(KIND_CONFIG_DIR);

    if let Some(name) = config_arg {
        let extension = config_dir.join("extension").join(format!("kind-{}.yaml", name));
        if extension.exists() {
            info!("using extension config: kind-{}.yaml", name);
            return Ok(Some(extension));
        }
        let standard = config_dir.join(format!("kind-{}.yaml", name));
        if standard.exists() {
            info!("using config: kind-{}.yaml", name);
            return Ok(Some(standard));
        }
        warn!("config 'kind-{}.yaml' not found", name);
    }

    if let Some(value) = &settings.kind_config {
        let path = if let Some(name) = value.strip_prefix("extension/") {
            config_dir.join("extension").join(format!("kind-{}.yaml", name))
        } else if value.ends_with(".yaml") {
            config_dir.join(value)
        } else {
            config_dir.join(format!("kind-{}.yaml", value))
        };
        if path.exists() {
            info!("using config from KIND_CONFIG: {}", value);
            return Ok(Some(path));
        }
        return KindConfigMissingSnafu { path }.fail();
    }

    let default = config_dir.join("kind-config.yaml");
    if default.exists() {
        info!("using default config: kind-config.yaml");
        return Ok(Some(default));
    }
    let custom = config_dir.join("kind-custom.yaml");
    if custom.exists() {
        return Ok(Some(custom));
    }

    info!("no kind config file found, using kind defaults");
    Ok(None)
}

#[cfg(all(test, feature = "integ"))]
mod integ {
    use super::*;
    use crate::manager::Error;

    fn test_settings(cluster_name: &str, kubeconfig_dir: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.cluster_name = cluster_name.to_string();
        settings.kubeconfig_path = kubeconfig_dir.join("kubeconfig.yaml");
        settings.ingress_enabled = false;
        settings.metrics_disabled = true;
        settings
    }

    #[tokio::test]
    async fn cluster_up_twice_fails_without_touching_the_cluster() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = test_settings("hostk8s-selftest-up", dir.path());

        cluster_up(&settings, None).await.unwrap();
        let second = cluster_up(&settings, None).await;
        assert!(matches!(second, Err(Error::ClusterExists { .. })));
        // The first cluster must have survived the failed second attempt.
        assert!(Kind
            .cluster_exists(&settings.cluster_name)
            .await
            .unwrap());

        cluster_down(&settings).await.unwrap();
    }

    #[tokio::test]
    async fn cluster_down_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let settings = test_settings("hostk8s-selftest-absent", dir.path());
        cluster_down(&settings).await.unwrap();
        cluster_down(&settings).await.unwrap();
    }
}
