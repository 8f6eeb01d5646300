use anyhow::{Context, Result};
use clap::Parser;
use model::apps;
use model::manager::ClusterManager;
use model::Settings;

/// Deploy an app from software/apps. Helm charts, kustomizations and plain manifests are all
/// supported; the app directory's contents decide which deployment method is used.
#[derive(Debug, Parser)]
pub(crate) struct Deploy {
    /// Name of the app directory under software/apps.
    app: String,

    /// Namespace to deploy into.
    #[clap(default_value = "default")]
    namespace: String,
}

impl Deploy {
    pub(crate) async fn run(self, settings: &Settings, manager: ClusterManager) -> Result<()> {
        apps::deploy_app(&manager, settings, &self.app, &self.namespace)
            .await
            .context(format!("Unable to deploy app '{}'", self.app))?;
        println!("App '{}' deployed to '{}'.", self.app, self.namespace);
        Ok(())
    }
}
