use super::error::Result;
use super::{run, run_with_stdin};
use log::info;
use std::path::Path;

/// Wrapper over the `kubectl` CLI, kept only for manifest and kustomize application, which
/// kubectl owns server-side apply semantics for. State reads never go through here.
#[derive(Debug, Clone)]
pub struct Kubectl {
    kubeconfig: String,
}

impl Kubectl {
    pub fn new(kubeconfig: &Path) -> Self {
        Self {
            kubeconfig: kubeconfig.display().to_string(),
        }
    }

    fn envs(&self) -> [(&str, &str); 1] {
        [("KUBECONFIG", self.kubeconfig.as_str())]
    }

    pub async fn apply_file(&self, path: &Path, namespace: Option<&str>) -> Result<()> {
        info!("applying manifest '{}'", path.display());
        let mut args = vec!["apply".to_string(), "-f".to_string(), path.display().to_string()];
        push_namespace(&mut args, namespace);
        run("kubectl", args, &self.envs()).await?;
        Ok(())
    }

    pub async fn apply_kustomization(&self, dir: &Path, namespace: Option<&str>) -> Result<()> {
        info!("applying kustomization '{}'", dir.display());
        let mut args = vec!["apply".to_string(), "-k".to_string(), dir.display().to_string()];
        push_namespace(&mut args, namespace);
        run("kubectl", args, &self.envs()).await?;
        Ok(())
    }

    pub async fn apply_stdin(&self, manifest: &str) -> Result<()> {
        run_with_stdin("kubectl", ["apply", "-f", "-"], &self.envs(), manifest).await?;
        Ok(())
    }

    pub async fn delete_file(&self, path: &Path, namespace: Option<&str>) -> Result<()> {
        let mut args = vec![
            "delete".to_string(),
            "-f".to_string(),
            path.display().to_string(),
            "--ignore-not-found".to_string(),
        ];
        push_namespace(&mut args, namespace);
        run("kubectl", args, &self.envs()).await?;
        Ok(())
    }

    pub async fn delete_kustomization(&self, dir: &Path, namespace: Option<&str>) -> Result<()> {
        let mut args = vec![
            "delete".to_string(),
            "-k".to_string(),
            dir.display().to_string(),
            "--ignore-not-found".to_string(),
        ];
        push_namespace(&mut args, namespace);
        run("kubectl", args, &self.envs()).await?;
        Ok(())
    }

    /// Delete common workload resource kinds by label selector, across all namespaces. Used when
    /// an app leaves resources behind that neither helm nor a manifest file accounts for.
    pub async fn delete_by_label(&self, selector: &str) -> Result<()> {
        run(
            "kubectl",
            [
                "delete",
                "all,ingress,configmap,secret",
                "-l",
                selector,
                "-A",
                "--ignore-not-found",
            ],
            &self.envs(),
        )
        .await?;
        Ok(())
    }

    pub async fn use_context(&self, context: &str) -> Result<()> {
        run("kubectl", ["config", "use-context", context], &self.envs()).await?;
        Ok(())
    }
}

fn push_namespace(args: &mut Vec<String>, namespace: Option<&str>) {
    if let Some(namespace) = namespace {
        args.push("--namespace".to_string());
        args.push(namespace.to_string());
    }
}
