/*!

Secret management for stacks: a declarative contract (`hostk8s.secrets.yaml`) names the secrets a
stack needs, values are generated or taken verbatim and stored in Vault, and ExternalSecret
manifests are emitted so the cluster pulls them from Vault at deploy time.

!*/

mod contract;
mod generate;
mod manifest;
mod vault;

pub use contract::{ContractSpec, DataEntry, SecretContract, SecretEntry};
pub use generate::generate_value;
pub use vault::VaultClient;

use crate::config::Settings;
use crate::constants::{EXTERNAL_SECRETS_FILE, SECRET_CONTRACT_FILE, STACKS_DIR};
use log::{info, warn};
use snafu::{ResultExt, Snafu};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Unable to read contract '{}': {}", path.display(), source))]
    ContractRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("Unable to parse contract '{}': {}", path.display(), source))]
    ContractParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[snafu(display("Unable to render the ExternalSecret manifests: {}", source))]
    ManifestRender { source: serde_yaml::Error },

    #[snafu(display("Unable to write '{}': {}", path.display(), source))]
    ManifestWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("{}", source))]
    Vault { source: vault::Error },
}

fn contract_path(stack: &str) -> PathBuf {
    PathBuf::from(STACKS_DIR).join(stack).join(SECRET_CONTRACT_FILE)
}

fn manifest_path(stack: &str) -> PathBuf {
    PathBuf::from(STACKS_DIR).join(stack).join(EXTERNAL_SECRETS_FILE)
}

fn load_contract(stack: &str) -> Result<Option<SecretContract>> {
    let path = contract_path(stack);
    if !path.is_file() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path).context(ContractReadSnafu { path: &path })?;
    let contract = serde_yaml::from_str(&content).context(ContractParseSnafu { path })?;
    Ok(Some(contract))
}

fn vault_client(settings: &Settings) -> Result<VaultClient> {
    VaultClient::new(&settings.vault_addr, &settings.vault_token).context(VaultSnafu)
}

/// Populate Vault from a stack's contract and write the ExternalSecret manifests. Paths that
/// already exist in Vault keep their values; the manifest file is always regenerated.
pub async fn add_secrets(settings: &Settings, stack: &str) -> Result<()> {
    let contract = match load_contract(stack)? {
        Some(contract) => contract,
        None => {
            info!("no secret contract found for stack '{}'", stack);
            return Ok(());
        }
    };

    let vault = vault_client(settings)?;
    vault.check_health().await.context(VaultSnafu)?;

    info!("processing secrets for stack '{}'", stack);
    for entry in &contract.spec.secrets {
        let vault_path = format!("{}/{}/{}", stack, entry.namespace, entry.name);
        if vault.secret_exists(&vault_path).await {
            info!(
                "secret '{}' already exists in Vault, skipping population",
                entry.name
            );
            continue;
        }

        info!(
            "populating Vault with secret '{}' for namespace '{}'",
            entry.name, entry.namespace
        );
        let mut data = BTreeMap::new();
        for item in &entry.data {
            if let Some(value) = &item.value {
                data.insert(item.key.clone(), value.clone());
            } else if let Some(kind) = &item.generate {
                data.insert(item.key.clone(), generate_value(kind, item.length));
            } else {
                warn!(
                    "no value or generate type for key '{}' in secret '{}'",
                    item.key, entry.name
                );
            }
        }
        vault.write_secret(&vault_path, &data).await.context(VaultSnafu)?;
    }

    let manifests = manifest::render_external_secrets(stack, &contract.spec.secrets)
        .context(ManifestRenderSnafu)?;
    let path = manifest_path(stack);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context(ManifestWriteSnafu { path: &path })?;
    }
    std::fs::write(&path, manifests).context(ManifestWriteSnafu { path: &path })?;
    info!("ExternalSecret manifests generated: {}", path.display());
    Ok(())
}

/// Remove a stack's secrets from Vault and delete the generated manifest file. Without a
/// contract, paths are discovered by listing Vault under the stack prefix.
pub async fn remove_secrets(settings: &Settings, stack: &str) -> Result<()> {
    let vault = vault_client(settings)?;
    vault.check_health().await.context(VaultSnafu)?;

    info!("removing secrets for stack '{}' from Vault", stack);
    match load_contract(stack)? {
        Some(contract) => {
            for entry in &contract.spec.secrets {
                let vault_path = format!("{}/{}/{}", stack, entry.namespace, entry.name);
                info!("removing secret at 'secret/{}'", vault_path);
                vault.delete_secret(&vault_path).await;
            }
        }
        None => {
            warn!("no secret contract found for stack '{}', removing by discovery", stack);
            let namespaces = vault.list_secrets(stack).await.context(VaultSnafu)?;
            for namespace in namespaces {
                let namespace = namespace.trim_end_matches('/');
                let base = format!("{}/{}", stack, namespace);
                for name in vault.list_secrets(&base).await.context(VaultSnafu)? {
                    let vault_path = format!("{}/{}", base, name.trim_end_matches('/'));
                    info!("removing secret at 'secret/{}'", vault_path);
                    vault.delete_secret(&vault_path).await;
                }
            }
        }
    }

    let path = manifest_path(stack);
    if path.is_file() {
        info!("removing ExternalSecret manifests: {}", path.display());
        std::fs::remove_file(&path).context(ManifestWriteSnafu { path })?;
    }
    Ok(())
}

/// List secret paths in Vault, optionally scoped to one stack. Returns the listed keys rather
/// than printing, so the CLI owns presentation.
pub async fn list_secrets(settings: &Settings, stack: Option<&str>) -> Result<Vec<String>> {
    let vault = vault_client(settings)?;
    vault.check_health().await.context(VaultSnafu)?;

    let base = stack.unwrap_or("");
    let keys = vault.list_secrets(base).await.context(VaultSnafu)?;
    Ok(keys
        .into_iter()
        .map(|key| match stack {
            Some(stack) => format!("{}/{}", stack, key),
            None => key,
        })
        .collect())
}
