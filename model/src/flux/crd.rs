use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A Flux GitRepository source. The `CustomResource` derive also produces a struct named
/// `GitRepository` which represents the CRD object in the k8s API.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "source.toolkit.fluxcd.io",
    kind = "GitRepository",
    namespaced,
    plural = "gitrepositories",
    singular = "gitrepository",
    status = "GitRepositoryStatus",
    version = "v1"
)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositorySpec {
    /// The git repository URL.
    pub url: String,
    /// Reconciliation interval, e.g. `1m`.
    pub interval: String,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<GitRepositoryRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspend: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
pub struct GitRepositoryRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositoryStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

/// A Flux Kustomization, the unit of GitOps application.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    derive = "Default",
    derive = "PartialEq",
    group = "kustomize.toolkit.fluxcd.io",
    kind = "Kustomization",
    namespaced,
    plural = "kustomizations",
    singular = "kustomization",
    status = "KustomizationStatus",
    version = "v1"
)]
#[serde(rename_all = "camelCase")]
pub struct KustomizationSpec {
    pub interval: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub prune: bool,
    pub source_ref: SourceRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspend: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<DependencyRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
pub struct DependencyRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct KustomizationStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_applied_revision: Option<String>,
}

/// The standard condition shape the Flux controllers write.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// The `Ready` condition of a list of conditions, if present.
pub fn ready_condition(conditions: Option<&Vec<Condition>>) -> Option<&Condition> {
    conditions.and_then(|conditions| conditions.iter().find(|c| c.type_ == "Ready"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kustomization_round_trips_camel_case() {
        let yaml = r#"
interval: 1m
path: ./software/stacks/sample
prune: true
sourceRef:
  kind: GitRepository
  name: flux-system
targetNamespace: default
"#;
        let spec: KustomizationSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.source_ref.name, "flux-system");
        assert_eq!(spec.target_namespace.as_deref(), Some("default"));
        let out = serde_yaml::to_string(&spec).unwrap();
        assert!(out.contains("sourceRef"));
        assert!(out.contains("targetNamespace"));
    }

    #[test]
    fn ready_condition_lookup() {
        let conditions = vec![
            Condition {
                type_: "Reconciling".to_string(),
                status: "True".to_string(),
                ..Default::default()
            },
            Condition {
                type_: "Ready".to_string(),
                status: "False".to_string(),
                message: Some("dependency 'flux-system/bootstrap' is not ready".to_string()),
                ..Default::default()
            },
        ];
        let ready = ready_condition(Some(&conditions)).unwrap();
        assert_eq!(ready.status, "False");
    }
}
