use anyhow::{Context, Result};
use clap::Parser;
use model::manager::ClusterManager;
use model::{stack, Settings};

/// Deploy a software stack: install Flux if needed, then point it at the stack's directory in
/// the GitOps repository.
#[derive(Debug, Parser)]
pub(crate) struct Up {
    /// Name of the stack directory under software/stacks (may include an `extension/` prefix).
    stack: String,
}

impl Up {
    pub(crate) async fn run(self, settings: &Settings, manager: ClusterManager) -> Result<()> {
        stack::deploy_stack(&manager, settings, &self.stack)
            .await
            .context(format!("Unable to deploy stack '{}'", self.stack))?;
        println!("Stack '{}' deployed. Flux is reconciling it.", self.stack);
        Ok(())
    }
}
