use anyhow::{Context, Result};
use clap::Parser;
use model::manager::ClusterManager;
use model::{stack, Settings};

/// Remove a software stack: delete its bootstrap kustomization, the stack's labeled
/// kustomizations, and its GitRepository source.
#[derive(Debug, Parser)]
pub(crate) struct Down {
    /// Name of the stack directory under software/stacks.
    stack: String,
}

impl Down {
    pub(crate) async fn run(self, _settings: &Settings, manager: ClusterManager) -> Result<()> {
        stack::remove_stack(&manager, &self.stack)
            .await
            .context(format!("Unable to remove stack '{}'", self.stack))?;
        println!("Stack '{}' removed.", self.stack);
        Ok(())
    }
}
