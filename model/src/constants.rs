/// Helper macro to avoid retyping the base domain-like name of our system when creating further
/// string constants from it. When given no parameters, this returns the base label prefix of the
/// system. When given a string literal parameter it adds `.parameter` to the end.
macro_rules! hostk8s {
    () => {
        "hostk8s"
    };
    ($s:literal) => {
        concat!(hostk8s!(), ".", $s)
    };
}

// System identifiers
pub const NAMESPACE: &str = hostk8s!();
pub const FLUX_NAMESPACE: &str = "flux-system";

// Label keys
pub const LABEL_APP: &str = hostk8s!("app");
pub const LABEL_APPLICATION: &str = hostk8s!("application");
pub const LABEL_COMPONENT: &str = hostk8s!("component");
pub const LABEL_STACK: &str = hostk8s!("stack");
pub const LABEL_TYPE: &str = hostk8s!("type");
pub const LABEL_NAMESPACE_CREATED: &str = hostk8s!("created");

// Labels on generated ExternalSecret manifests
pub const LABEL_SECRET_MANAGED: &str = "hostk8s.io/managed";
pub const LABEL_SECRET_CONTRACT: &str = "hostk8s.io/contract";

// Well-known in-cluster component names
pub const FLUX_SOURCE_CONTROLLER: &str = "source-controller";
pub const INGRESS_CONTROLLER: &str = "ingress-nginx-controller";
pub const METALLB_CONTROLLER: &str = "metallb-controller";
pub const METRICS_SERVER: &str = "metrics-server";
pub const VAULT_STATEFULSET: &str = "vault";

// Docker artifacts
pub const REGISTRY_CONTAINER: &str = "hostk8s-registry";
pub const KIND_NETWORK: &str = "kind";

// Flux kustomization naming conventions
pub const BOOTSTRAP_PREFIX: &str = "bootstrap-";
pub const STACK_SUFFIX: &str = "stack";
pub const SHARED_GIT_REPOSITORY: &str = "flux-system";

// Reconcile request annotation used by the Flux controllers
pub const RECONCILE_ANNOTATION: &str = "reconcile.fluxcd.io/requestedAt";

// Repository layout
pub const APPS_DIR: &str = "software/apps";
pub const STACKS_DIR: &str = "software/stacks";
pub const SECRET_CONTRACT_FILE: &str = "hostk8s.secrets.yaml";
pub const EXTERNAL_SECRETS_FILE: &str = "manifests/external-secrets.yaml";

// Namespaces that must never be garbage collected by app removal
pub const PROTECTED_NAMESPACES: &[&str] = &[
    "default",
    "kube-system",
    "kube-public",
    "kube-node-lease",
    "flux-system",
    "metallb-system",
    "ingress-nginx",
    NAMESPACE,
];

#[test]
fn hostk8s_constants_macro_test() {
    assert_eq!("hostk8s", hostk8s!());
    assert_eq!("hostk8s.app", LABEL_APP);
    assert_eq!("hostk8s.foo", hostk8s!("foo"));
}
