use super::error::Result;
use super::{is_installed, run};
use log::info;
use std::path::Path;

/// Wrapper over the `flux` CLI, used once per cluster to install the GitOps controllers.
/// All later interaction with Flux resources goes through the typed Kubernetes client.
#[derive(Debug, Clone)]
pub struct FluxCli {
    kubeconfig: String,
}

impl FluxCli {
    pub fn new(kubeconfig: &Path) -> Self {
        Self {
            kubeconfig: kubeconfig.display().to_string(),
        }
    }

    pub fn is_installed() -> bool {
        is_installed("flux")
    }

    /// `flux install` deploys the GitOps controllers into flux-system.
    pub async fn install(&self) -> Result<()> {
        info!("installing flux controllers");
        run(
            "flux",
            [
                "install",
                "--components-extra=image-reflector-controller,image-automation-controller",
                "--network-policy=false",
                "--watch-all-namespaces=true",
            ],
            &[("KUBECONFIG", self.kubeconfig.as_str())],
        )
        .await?;
        Ok(())
    }
}
