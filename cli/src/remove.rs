use anyhow::{Context, Result};
use clap::Parser;
use model::apps;
use model::manager::ClusterManager;
use model::Settings;

/// Remove a deployed app, then garbage collect its namespace if this tool created it and it
/// ended up empty.
#[derive(Debug, Parser)]
pub(crate) struct Remove {
    /// Name of the app directory under software/apps.
    app: String,

    /// Namespace the app was deployed into.
    #[clap(default_value = "default")]
    namespace: String,
}

impl Remove {
    pub(crate) async fn run(self, settings: &Settings, manager: ClusterManager) -> Result<()> {
        apps::remove_app(&manager, settings, &self.app, &self.namespace)
            .await
            .context(format!("Unable to remove app '{}'", self.app))?;
        println!("App '{}' removed from '{}'.", self.app, self.namespace);
        Ok(())
    }
}
