/*!

The cluster manager provides operations for coordinating the creation, inspection and teardown of
the local kind cluster and the objects this tool owns inside it. Mutations that belong to external
tools (kind, docker, helm, kubectl apply, flux install) are delegated to the wrappers in
[`crate::tools`]; everything else happens through a typed `kube::Client`.

!*/

mod error;
mod lifecycle;

pub use error::{Error, Result};
pub use lifecycle::{cluster_down, cluster_restart, cluster_up};

use crate::constants::{
    FLUX_NAMESPACE, FLUX_SOURCE_CONTROLLER, INGRESS_CONTROLLER, LABEL_APP, LABEL_NAMESPACE_CREATED,
    NAMESPACE, PROTECTED_NAMESPACES,
};
use crate::retry::{retry_with_backoff, DEFAULT_ATTEMPTS, DEFAULT_DELAY};
use crate::system::{hostk8s_namespace, labeled_namespace};
use error::{ClientCreateKubeconfigSnafu, ConfigReadSnafu, CreateSnafu, KubeSnafu};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Node, Secret};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, Resource as KubeResource, ResourceExt};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use snafu::ResultExt;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

pub struct ClusterManager {
    pub k8s_client: Client,
}

impl ClusterManager {
    /// Create a `ClusterManager` from the path to a kubeconfig file.
    pub async fn new_from_kubeconfig_path(kubeconfig_path: &Path) -> Result<Self> {
        let kubeconfig = Kubeconfig::read_from(kubeconfig_path).context(ConfigReadSnafu)?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context(ClientCreateKubeconfigSnafu)?;
        Ok(ClusterManager {
            k8s_client: config.try_into().context(KubeSnafu {
                action: "create client from `Kubeconfig`",
            })?,
        })
    }

    /// Create a `ClusterManager` using the default `kube::Client`.
    pub async fn new() -> Result<Self> {
        Ok(ClusterManager {
            k8s_client: Client::try_default().await.context(KubeSnafu {
                action: "create client from `Kubeconfig`",
            })?,
        })
    }

    /// Create the `hostk8s` namespace and wait for it to be visible.
    pub async fn create_namespace(&self) -> Result<()> {
        let ns = hostk8s_namespace();
        self.create_or_update_namespace(&ns).await?;

        let api = self.api::<Namespace>();
        for _ in 0..10 {
            if api.get(NAMESPACE).await.is_ok() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        error::NamespaceNotVisibleSnafu {
            namespace: NAMESPACE,
        }
        .fail()
    }

    /// Create an application namespace if it does not exist, labeled as created by this tool.
    pub async fn ensure_namespace(&self, name: &str) -> Result<()> {
        let api = self.api::<Namespace>();
        if api.get(name).await.is_ok() {
            return Ok(());
        }
        info!("creating namespace '{}'", name);
        self.create_or_update_namespace(&labeled_namespace(name))
            .await
    }

    /// Delete a namespace after an app removal, but only when this tool created it and nothing
    /// labeled as an app remains inside. System namespaces are never touched.
    pub async fn cleanup_namespace_if_empty(&self, name: &str) -> Result<()> {
        if PROTECTED_NAMESPACES.contains(&name) {
            return Ok(());
        }
        let api = self.api::<Namespace>();
        let namespace = match api.get(name).await {
            Ok(namespace) => namespace,
            Err(_) => return Ok(()),
        };
        let created_by_us = namespace
            .labels()
            .get(LABEL_NAMESPACE_CREATED)
            .map(|v| v == "true")
            .unwrap_or(false);
        if !created_by_us {
            debug!("namespace '{}' was not created here, leaving it", name);
            return Ok(());
        }
        if self.labeled_app_count(name).await? > 0 {
            debug!("namespace '{}' still has labeled apps, leaving it", name);
            return Ok(());
        }
        info!("removing empty namespace '{}'", name);
        api.delete(name, &DeleteParams::default())
            .await
            .context(KubeSnafu {
                action: format!("delete namespace '{}'", name),
            })?;
        Ok(())
    }

    /// Count resources in a namespace still carrying the app label.
    async fn labeled_app_count(&self, namespace: &str) -> Result<usize> {
        let params = ListParams {
            label_selector: Some(LABEL_APP.to_string()),
            ..Default::default()
        };
        let deployments = Api::<Deployment>::namespaced(self.k8s_client.clone(), namespace)
            .list(&params)
            .await
            .context(KubeSnafu {
                action: "list labeled deployments",
            })?;
        let services =
            Api::<k8s_openapi::api::core::v1::Service>::namespaced(self.k8s_client.clone(), namespace)
                .list(&params)
                .await
                .context(KubeSnafu {
                    action: "list labeled services",
                })?;
        Ok(deployments.items.len() + services.items.len())
    }

    /// Create or update a plain `Secret` with string data.
    pub async fn create_secret(
        &self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, String>,
    ) -> Result<()> {
        let secret = Secret {
            metadata: kube::api::ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            string_data: Some(data),
            ..Default::default()
        };
        self.ensure_namespace(namespace).await?;
        self.create_or_update(&secret, "secret").await
    }

    /// Wait until every node reports the `Ready` condition, polling with backoff.
    pub async fn wait_for_nodes_ready(&self, timeout: Duration) -> Result<()> {
        let api = self.api::<Node>();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let nodes = api.list(&ListParams::default()).await.context(KubeSnafu {
                action: "list cluster nodes",
            })?;
            let total = nodes.items.len();
            let ready = nodes.items.iter().filter(|node| node_ready(node)).count();
            if total > 0 && ready == total {
                info!("all {} node(s) ready", total);
                return Ok(());
            }
            debug!("{} of {} node(s) ready", ready, total);
            if tokio::time::Instant::now() >= deadline {
                return error::NodesNotReadySnafu {
                    seconds: timeout.as_secs(),
                }
                .fail();
            }
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
    }

    /// True when the Flux source controller deployment exists.
    pub async fn has_flux(&self) -> bool {
        Api::<Deployment>::namespaced(self.k8s_client.clone(), FLUX_NAMESPACE)
            .get(FLUX_SOURCE_CONTROLLER)
            .await
            .is_ok()
    }

    /// True when the ingress controller deployment in the `hostk8s` namespace is fully ready.
    pub async fn has_ingress_controller(&self) -> bool {
        let deployment = match Api::<Deployment>::namespaced(self.k8s_client.clone(), NAMESPACE)
            .get(INGRESS_CONTROLLER)
            .await
        {
            Ok(deployment) => deployment,
            Err(_) => return false,
        };
        deployment
            .status
            .map(|status| {
                let ready = status.ready_replicas.unwrap_or(0);
                let desired = status.replicas.unwrap_or(0);
                desired > 0 && ready == desired
            })
            .unwrap_or(false)
    }

    /// Create or update a namespaced k8s object, retrying transient failures.
    pub(crate) async fn create_or_update<T>(&self, data: &T, what: &str) -> Result<()>
    where
        T: KubeResource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        <T as KubeResource>::DynamicType: Default,
    {
        retry_with_backoff(DEFAULT_ATTEMPTS, DEFAULT_DELAY, what, || async {
            let api =
                self.namespaced_api::<T>(&data.meta().namespace.clone().unwrap_or_default());
            Self::apply(&api, data, what).await
        })
        .await
    }

    /// Namespaces are cluster scoped, so they take a dedicated path.
    async fn create_or_update_namespace(&self, data: &Namespace) -> Result<()> {
        retry_with_backoff(DEFAULT_ATTEMPTS, DEFAULT_DELAY, "namespace", || async {
            Self::apply(&self.api::<Namespace>(), data, "namespace").await
        })
        .await
    }

    /// If the object already exists, update it with a merge patch. If not, create it.
    async fn apply<T>(api: &Api<T>, data: &T, what: &str) -> Result<()>
    where
        T: KubeResource + Clone + DeserializeOwned + Serialize + Debug,
        <T as KubeResource>::DynamicType: Default,
    {
        match api.get(&data.name_any()).await {
            Ok(existing) => {
                api.patch(
                    &existing.name_any(),
                    &PatchParams::default(),
                    &Patch::Merge(data),
                )
                .await
            }
            Err(_err) => api.create(&PostParams::default(), data).await,
        }
        .context(CreateSnafu { what })?;

        Ok(())
    }

    /// Creates a non namespaced api of type `T`
    pub(crate) fn api<T>(&self) -> Api<T>
    where
        T: KubeResource,
        <T as KubeResource>::DynamicType: Default,
    {
        Api::<T>::all(self.k8s_client.clone())
    }

    /// Creates a namespaced api of type `T`
    pub(crate) fn namespaced_api<T>(&self, namespace: &str) -> Api<T>
    where
        T: KubeResource<Scope = NamespaceResourceScope>,
        <T as KubeResource>::DynamicType: Default,
    {
        Api::<T>::namespaced(self.k8s_client.clone(), namespace)
    }
}

/// A node is ready when its `Ready` condition reports `True`.
pub(crate) fn node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod test {
    use super::*;
    use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus};

    fn node_with_conditions(conditions: Vec<NodeCondition>) -> Node {
        Node {
            status: Some(NodeStatus {
                conditions: Some(conditions),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn node_ready_condition() {
        let node = node_with_conditions(vec![NodeCondition {
            type_: "Ready".to_string(),
            status: "True".to_string(),
            ..Default::default()
        }]);
        assert!(node_ready(&node));
    }

    #[test]
    fn node_not_ready_condition() {
        let node = node_with_conditions(vec![NodeCondition {
            type_: "Ready".to_string(),
            status: "False".to_string(),
            ..Default::default()
        }]);
        assert!(!node_ready(&node));
        assert!(!node_ready(&Node::default()));
    }
}

#[cfg(all(test, feature = "integ"))]
mod integ {
    use super::*;
    use crate::constants::LABEL_NAMESPACE_CREATED;
    use maplit::btreemap;
    use selftest::Cluster;
    use std::time::Duration;

    #[tokio::test]
    async fn namespaces_and_secrets() {
        let cluster = Cluster::new("hostk8s-selftest-manager").unwrap();
        let manager = ClusterManager::new_from_kubeconfig_path(&cluster.kubeconfig())
            .await
            .unwrap();
        manager
            .wait_for_nodes_ready(Duration::from_secs(300))
            .await
            .unwrap();

        manager.create_namespace().await.unwrap();
        cluster
            .wait_for_namespace(NAMESPACE, Duration::from_secs(30))
            .await
            .unwrap();

        manager.ensure_namespace("selftest-apps").await.unwrap();
        let namespaces: Api<Namespace> = manager.api();
        let ns = namespaces.get("selftest-apps").await.unwrap();
        assert_eq!(
            ns.labels().get(LABEL_NAMESPACE_CREATED).map(String::as_str),
            Some("true")
        );

        manager
            .create_secret(
                "selftest-apps",
                "demo-credentials",
                btreemap! { "username".to_string() => "admin".to_string() },
            )
            .await
            .unwrap();

        // Only a labeled, empty namespace may be garbage collected.
        manager
            .cleanup_namespace_if_empty("selftest-apps")
            .await
            .unwrap();
    }
}
