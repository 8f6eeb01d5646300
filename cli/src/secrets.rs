use anyhow::{Context, Result};
use clap::Parser;
use model::{secrets, Settings};

/// Manage Vault secrets declared by a stack's `hostk8s.secrets.yaml` contract.
#[derive(Debug, Parser)]
pub(crate) struct Secrets {
    #[clap(subcommand)]
    command: SecretsCommand,
}

#[derive(Debug, Parser)]
enum SecretsCommand {
    /// Populate Vault from the stack's secret contract and write its ExternalSecret manifests.
    Add(Add),
    /// Delete the stack's secrets from Vault and remove its generated manifests.
    Remove(Remove),
    /// List the Vault paths of stored secrets.
    List(List),
}

#[derive(Debug, Parser)]
struct Add {
    /// Name of the stack directory under software/stacks.
    stack: String,
}

#[derive(Debug, Parser)]
struct Remove {
    /// Name of the stack directory under software/stacks.
    stack: String,
}

#[derive(Debug, Parser)]
struct List {
    /// Limit the listing to one stack.
    stack: Option<String>,
}

impl Secrets {
    pub(crate) async fn run(self, settings: &Settings) -> Result<()> {
        match self.command {
            SecretsCommand::Add(add) => {
                secrets::add_secrets(settings, &add.stack)
                    .await
                    .context(format!("Unable to add secrets for stack '{}'", add.stack))?;
                println!("Secrets for stack '{}' stored in Vault.", add.stack);
            }
            SecretsCommand::Remove(remove) => {
                secrets::remove_secrets(settings, &remove.stack)
                    .await
                    .context(format!(
                        "Unable to remove secrets for stack '{}'",
                        remove.stack
                    ))?;
                println!("Secrets for stack '{}' removed from Vault.", remove.stack);
            }
            SecretsCommand::List(list) => {
                let paths = secrets::list_secrets(settings, list.stack.as_deref())
                    .await
                    .context("Unable to list secrets")?;
                if paths.is_empty() {
                    println!("No secrets stored.");
                } else {
                    for path in paths {
                        println!("{}", path);
                    }
                }
            }
        }
        Ok(())
    }
}
