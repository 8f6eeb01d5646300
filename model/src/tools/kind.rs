use super::error::{CreateDirSnafu, NonUtf8PathSnafu, Result};
use super::{run, stdout_string};
use crate::config::Settings;
use log::info;
use snafu::{OptionExt, ResultExt};
use std::path::Path;

/// Wrapper over the `kind` CLI. All cluster lifecycle mutations go through here; nothing else in
/// the crate shells out to `kind`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Kind;

impl Kind {
    /// The names of all kind clusters on this host.
    pub async fn clusters(&self) -> Result<Vec<String>> {
        let output = run("kind", ["get", "clusters"], &[]).await?;
        Ok(stdout_string(&output)
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty() && *line != "No kind clusters found.")
            .collect())
    }

    pub async fn cluster_exists(&self, name: &str) -> Result<bool> {
        Ok(self.clusters().await?.iter().any(|c| c == name))
    }

    /// Create a cluster, writing its kubeconfig to `settings.kubeconfig_path`. An optional kind
    /// config file may be passed. The kubeconfig parent directory is created first.
    pub async fn create_cluster(&self, settings: &Settings, config: Option<&Path>) -> Result<()> {
        if let Some(parent) = settings.kubeconfig_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                path: parent.to_path_buf(),
            })?;
        }
        let kubeconfig = settings
            .kubeconfig_path
            .to_str()
            .context(NonUtf8PathSnafu {
                path: settings.kubeconfig_path.clone(),
            })?
            .to_string();
        let image = format!("kindest/node:{}", settings.k8s_version);
        let mut args = vec![
            "create".to_string(),
            "cluster".to_string(),
            "--name".to_string(),
            settings.cluster_name.clone(),
            "--quiet".to_string(),
            "--image".to_string(),
            image,
            "--kubeconfig".to_string(),
            kubeconfig,
        ];
        if let Some(config) = config {
            let config = config
                .to_str()
                .context(NonUtf8PathSnafu {
                    path: config.to_path_buf(),
                })?
                .to_string();
            args.push("--config".to_string());
            args.push(config);
        }
        run("kind", args, &[]).await?;
        Ok(())
    }

    /// Delete a cluster. Deleting a cluster that does not exist is a successful no-op.
    pub async fn delete_cluster(&self, name: &str) -> Result<()> {
        if !self.cluster_exists(name).await? {
            info!("kind cluster '{}' does not exist, nothing to delete", name);
            return Ok(());
        }
        run("kind", ["delete", "cluster", "--name", name], &[]).await?;
        Ok(())
    }
}
