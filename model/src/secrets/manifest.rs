use super::contract::SecretEntry;
use crate::constants::{LABEL_SECRET_CONTRACT, LABEL_SECRET_MANAGED};
use maplit::btreemap;
use serde::Serialize;
use std::collections::BTreeMap;

/// An ExternalSecret document: a reference from a cluster secret to its Vault path, safe to
/// commit since it carries no secret values.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExternalSecret {
    api_version: &'static str,
    kind: &'static str,
    metadata: Metadata,
    spec: Spec,
}

#[derive(Debug, Serialize)]
struct Metadata {
    name: String,
    namespace: String,
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Spec {
    refresh_interval: &'static str,
    secret_store_ref: StoreRef,
    target: Target,
    data: Vec<DataMapping>,
}

#[derive(Debug, Serialize)]
struct StoreRef {
    name: &'static str,
    kind: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Target {
    name: String,
    creation_policy: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DataMapping {
    secret_key: String,
    remote_ref: RemoteRef,
}

#[derive(Debug, Serialize)]
struct RemoteRef {
    key: String,
    property: String,
}

/// Render the `external-secrets.yaml` content for a stack: a generated-file header followed by
/// one ExternalSecret document per contract entry.
pub fn render_external_secrets(stack: &str, entries: &[SecretEntry]) -> serde_yaml::Result<String> {
    let mut out = format!(
        "# Generated ExternalSecret manifests from hostk8s.secrets.yaml\n\
         # This file is auto-generated - safe to commit to Git\n\
         # Contains no sensitive data - only Vault path references\n\
         # To regenerate: hostk8s secrets add {}\n",
        stack
    );
    for entry in entries {
        let manifest = external_secret(stack, entry);
        let yaml = serde_yaml::to_string(&manifest)?;
        // serde_yaml emits its own document marker.
        let yaml = yaml.strip_prefix("---\n").unwrap_or(&yaml);
        out.push_str("\n---\n");
        out.push_str(&format!("# ExternalSecret for {}\n", entry.name));
        out.push_str(yaml);
    }
    Ok(out)
}

fn external_secret(stack: &str, entry: &SecretEntry) -> ExternalSecret {
    let vault_path = format!("{}/{}/{}", stack, entry.namespace, entry.name);
    ExternalSecret {
        api_version: "external-secrets.io/v1",
        kind: "ExternalSecret",
        metadata: Metadata {
            name: entry.name.clone(),
            namespace: entry.namespace.clone(),
            labels: btreemap! {
                LABEL_SECRET_MANAGED.to_string() => "true".to_string(),
                LABEL_SECRET_CONTRACT.to_string() => stack.to_string()
            },
        },
        spec: Spec {
            refresh_interval: "10s",
            secret_store_ref: StoreRef {
                name: "vault-backend",
                kind: "ClusterSecretStore",
            },
            target: Target {
                name: entry.name.clone(),
                creation_policy: "Owner",
            },
            data: entry
                .data
                .iter()
                .map(|data| DataMapping {
                    secret_key: data.key.clone(),
                    remote_ref: RemoteRef {
                        key: vault_path.clone(),
                        property: data.key.clone(),
                    },
                })
                .collect(),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::secrets::contract::DataEntry;

    fn entry() -> SecretEntry {
        SecretEntry {
            name: "app-db".to_string(),
            namespace: "sample".to_string(),
            data: vec![
                DataEntry {
                    key: "username".to_string(),
                    value: Some("admin".to_string()),
                    generate: None,
                    length: None,
                },
                DataEntry {
                    key: "password".to_string(),
                    value: None,
                    generate: Some("password".to_string()),
                    length: Some(24),
                },
            ],
        }
    }

    #[test]
    fn rendered_manifest_references_vault_path() {
        let out = render_external_secrets("sample", &[entry()]).unwrap();
        assert!(out.starts_with("# Generated ExternalSecret manifests"));
        assert!(out.contains("# To regenerate: hostk8s secrets add sample"));
        assert!(out.contains("apiVersion: external-secrets.io/v1"));
        assert!(out.contains("refreshInterval: 10s"));
        assert!(out.contains("creationPolicy: Owner"));
        assert!(out.contains("key: sample/sample/app-db"));
        assert!(out.contains("secretKey: password"));
        // The contract's values never land in the manifest.
        assert!(!out.contains("admin"));
    }

    #[test]
    fn one_document_per_secret() {
        let mut second = entry();
        second.name = "cache".to_string();
        let out = render_external_secrets("sample", &[entry(), second]).unwrap();
        assert_eq!(out.matches("kind: ExternalSecret").count(), 2);
        assert_eq!(out.matches("\n---\n").count(), 2);
    }
}
