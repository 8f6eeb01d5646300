use crate::constants::{LABEL_NAMESPACE_CREATED, NAMESPACE};
use k8s_openapi::api::core::v1::Namespace;
use kube::api::ObjectMeta;
use maplit::btreemap;

/// Defines the `hostk8s` namespace that holds cluster add-ons.
pub fn hostk8s_namespace() -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(NAMESPACE.to_string()),
            labels: Some(btreemap! {
                "name".to_string() => NAMESPACE.to_string()
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Defines an application namespace, labeled so that namespace cleanup can tell the
/// namespaces this tool created apart from pre-existing ones.
pub fn labeled_namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(btreemap! {
                "name".to_string() => name.to_string(),
                LABEL_NAMESPACE_CREATED.to_string() => "true".to_string()
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn labeled_namespace_carries_marker() {
        let namespace = labeled_namespace("demo");
        let labels = namespace.metadata.labels.unwrap();
        assert_eq!(labels.get(LABEL_NAMESPACE_CREATED).unwrap(), "true");
        assert_eq!(namespace.metadata.name.unwrap(), "demo");
    }
}
