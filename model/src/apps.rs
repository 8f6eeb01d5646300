/*!

Manual application deployment from `software/apps/<name>`. An app directory's contents decide how
it is deployed: a `Chart.yaml` goes through helm, a `kustomization.yaml` through
`kubectl apply -k`, and a bare `app.yaml` is applied as a plain manifest.

!*/

use crate::config::Settings;
use crate::constants::{APPS_DIR, LABEL_APP};
use crate::manager::ClusterManager;
use crate::tools::{self, Helm, Kubectl};
use log::{info, warn};
use serde::Deserialize;
use snafu::{ResultExt, Snafu};
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("App '{}' not found. Available apps: {}", app, available.join(", ")))]
    UnknownApp { app: String, available: Vec<String> },

    #[snafu(display("Unable to {}: {}", action, source))]
    Manager {
        action: String,
        source: crate::manager::Error,
    },

    #[snafu(display("Unable to {}: {}", action, source))]
    Tool {
        action: String,
        source: tools::Error,
    },
}

/// How an app directory asks to be deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployKind {
    Helm,
    Kustomize,
    Manifest,
}

impl DeployKind {
    /// Detect the deployment type from the app directory contents. `Chart.yaml` wins over a
    /// `kustomization.yaml`, which wins over a legacy `app.yaml`.
    pub fn detect(app_dir: &Path) -> Option<DeployKind> {
        if app_dir.join("Chart.yaml").is_file() {
            Some(DeployKind::Helm)
        } else if app_dir.join("kustomization.yaml").is_file() {
            Some(DeployKind::Kustomize)
        } else if app_dir.join("app.yaml").is_file() {
            Some(DeployKind::Manifest)
        } else {
            None
        }
    }
}

/// Deploy an app into a namespace (`default` unless given).
pub async fn deploy_app(
    manager: &ClusterManager,
    settings: &Settings,
    app: &str,
    namespace: &str,
) -> Result<()> {
    let (app_dir, kind) = resolve_app(app)?;

    if namespace != "default" {
        manager
            .ensure_namespace(namespace)
            .await
            .context(ManagerSnafu {
                action: format!("create namespace '{}'", namespace),
            })?;
    }

    match kind {
        DeployKind::Helm => {
            info!("deploying '{}' via helm to '{}'", app, namespace);
            let helm = Helm::new(&settings.kubeconfig_path);
            let custom_values = app_dir.join("custom_values.yaml");
            let dev_values = app_dir.join("values").join("development.yaml");
            let mut values = Vec::new();
            if custom_values.is_file() {
                values.push(custom_values.as_path());
            }
            if dev_values.is_file() {
                values.push(dev_values.as_path());
            }
            helm.upgrade_install(
                app,
                &app_dir.display().to_string(),
                namespace,
                &values,
                &[],
            )
            .await
            .context(ToolSnafu {
                action: format!("deploy '{}' via helm", app),
            })?;
        }
        DeployKind::Kustomize => {
            info!("deploying '{}' via kustomize to '{}'", app, namespace);
            Kubectl::new(&settings.kubeconfig_path)
                .apply_kustomization(&app_dir, Some(namespace))
                .await
                .context(ToolSnafu {
                    action: format!("deploy '{}' via kustomize", app),
                })?;
        }
        DeployKind::Manifest => {
            info!("deploying '{}' via app.yaml to '{}'", app, namespace);
            Kubectl::new(&settings.kubeconfig_path)
                .apply_file(&app_dir.join("app.yaml"), Some(namespace))
                .await
                .context(ToolSnafu {
                    action: format!("deploy '{}' via app.yaml", app),
                })?;
        }
    }

    info!("'{}' deployed to '{}'", app, namespace);
    Ok(())
}

/// Remove an app, then drop its namespace if this tool created it and it ended up empty.
pub async fn remove_app(
    manager: &ClusterManager,
    settings: &Settings,
    app: &str,
    namespace: &str,
) -> Result<()> {
    let (app_dir, kind) = resolve_app(app)?;

    match kind {
        DeployKind::Helm => remove_helm_app(settings, app, &app_dir, namespace).await?,
        DeployKind::Kustomize => {
            let kubectl = Kubectl::new(&settings.kubeconfig_path);
            if let Err(e) = kubectl.delete_kustomization(&app_dir, Some(namespace)).await {
                warn!("error removing '{}' via kustomize (may not exist): {}", app, e);
            }
        }
        DeployKind::Manifest => {
            let kubectl = Kubectl::new(&settings.kubeconfig_path);
            if let Err(e) = kubectl
                .delete_file(&app_dir.join("app.yaml"), Some(namespace))
                .await
            {
                warn!("error removing '{}' via app.yaml (may not exist): {}", app, e);
            }
        }
    }

    if let Err(e) = manager.cleanup_namespace_if_empty(namespace).await {
        warn!("could not clean up namespace '{}': {}", namespace, e);
    }
    info!("'{}' removed from '{}'", app, namespace);
    Ok(())
}

/// Helm removal falls back through three stages: the release in the given namespace, the release
/// anywhere in the cluster, then label-based deletion (also trying the chart name when it differs
/// from the app name).
async fn remove_helm_app(
    settings: &Settings,
    app: &str,
    app_dir: &Path,
    namespace: &str,
) -> Result<()> {
    let helm = Helm::new(&settings.kubeconfig_path);

    if let Ok(releases) = helm.list(namespace).await {
        if releases.iter().any(|release| release == app) {
            helm.uninstall(app, namespace).await.context(ToolSnafu {
                action: format!("uninstall release '{}'", app),
            })?;
            return Ok(());
        }
    }

    if let Ok(releases) = helm.list_all().await {
        if let Some(release) = releases.iter().find(|release| release.name == app) {
            info!(
                "release '{}' not found in '{}', found in '{}'",
                app, namespace, release.namespace
            );
            helm.uninstall(app, &release.namespace)
                .await
                .context(ToolSnafu {
                    action: format!("uninstall release '{}'", app),
                })?;
            return Ok(());
        }
    }

    info!("release '{}' not found, trying label-based removal", app);
    let kubectl = Kubectl::new(&settings.kubeconfig_path);
    let mut removed = kubectl
        .delete_by_label(&format!("{}={}", LABEL_APP, app))
        .await
        .is_ok();

    // Charts sometimes label resources with the chart name rather than the app name.
    if let Some(chart_name) = chart_name(app_dir) {
        if chart_name != app {
            removed |= kubectl
                .delete_by_label(&format!("{}={}", LABEL_APP, chart_name))
                .await
                .is_ok();
        }
    }

    if !removed {
        warn!("no resources found for app '{}' (may already be removed)", app);
    }
    Ok(())
}

fn resolve_app(app: &str) -> Result<(PathBuf, DeployKind)> {
    let app_dir = PathBuf::from(APPS_DIR).join(app);
    match DeployKind::detect(&app_dir) {
        Some(kind) => Ok((app_dir, kind)),
        None => UnknownAppSnafu {
            app,
            available: available_apps(),
        }
        .fail(),
    }
}

/// Apps the `software/apps` directory currently offers.
pub fn available_apps() -> Vec<String> {
    let mut apps = Vec::new();
    if let Ok(entries) = std::fs::read_dir(APPS_DIR) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() && DeployKind::detect(&path).is_some() {
                apps.push(entry.file_name().to_string_lossy().to_string());
            }
        }
    }
    apps.sort();
    apps
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    name: Option<String>,
}

fn chart_name(app_dir: &Path) -> Option<String> {
    let content = std::fs::read_to_string(app_dir.join("Chart.yaml")).ok()?;
    let chart: ChartMeta = serde_yaml::from_str(&content).ok()?;
    chart.name
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn detect_prefers_chart_over_kustomization() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("kustomization.yaml"), "resources: []").unwrap();
        assert_eq!(DeployKind::detect(dir.path()), Some(DeployKind::Kustomize));
        fs::write(dir.path().join("Chart.yaml"), "name: demo").unwrap();
        assert_eq!(DeployKind::detect(dir.path()), Some(DeployKind::Helm));
    }

    #[test]
    fn detect_legacy_manifest() {
        let dir = TempDir::new().unwrap();
        assert_eq!(DeployKind::detect(dir.path()), None);
        fs::write(dir.path().join("app.yaml"), "kind: Pod").unwrap();
        assert_eq!(DeployKind::detect(dir.path()), Some(DeployKind::Manifest));
    }

    #[test]
    fn chart_name_parses_metadata() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("Chart.yaml"),
            "apiVersion: v2\nname: web-frontend\nversion: 0.1.0\n",
        )
        .unwrap();
        assert_eq!(chart_name(dir.path()).unwrap(), "web-frontend");
    }
}
