use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use maplit::btreemap;

/// Defines the `local-registry-hosting` config map in `kube-public`, the standard way to
/// advertise a local registry to tooling (<https://kind.sigs.k8s.io/docs/user/local-registry/>).
pub fn local_registry_hosting_config_map(registry_port: u16) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some("local-registry-hosting".to_string()),
            namespace: Some("kube-public".to_string()),
            ..Default::default()
        },
        data: Some(btreemap! {
            "localRegistryHosting.v1".to_string() => format!(
                "host: \"localhost:{}\"\nhelp: \"https://kind.sigs.k8s.io/docs/user/local-registry/\"\n",
                registry_port
            )
        }),
        ..Default::default()
    }
}
