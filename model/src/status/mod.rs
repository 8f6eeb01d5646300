//! Read-only cluster status. `collect` walks the cluster through the typed client and produces a
//! [`StatusSnapshot`], which `render` turns into the human readable report (or JSON).

mod derive;
mod error;
mod render;

pub use derive::{
    clean_ingress_path, deployment_ready, deployment_replicas, image_version, ingress_urls,
    kustomization_icon, pod_healthy, service_external_address, service_pending, StatusIcon,
};
pub use error::{Error, Result};
pub use render::{render_json, render_text};

use crate::config::Settings;
use crate::constants::{
    FLUX_NAMESPACE, FLUX_SOURCE_CONTROLLER, INGRESS_CONTROLLER, LABEL_APP, LABEL_APPLICATION,
    LABEL_COMPONENT, LABEL_STACK, METALLB_CONTROLLER, METRICS_SERVER, NAMESPACE,
    REGISTRY_CONTAINER, VAULT_STATEFULSET,
};
use crate::flux::{ready_condition, FluxClient};
use crate::manager::{node_ready, ClusterManager};
use crate::tools::Docker;
use derive::icon_from_ready;
use error::KubeSnafu;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Node, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::ListParams;
use kube::{Api, ResourceExt};
use log::warn;
use serde::Serialize;
use snafu::ResultExt;
use std::collections::{BTreeMap, HashSet};

const CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/control-plane";

/// Everything the status report shows, in one serializable structure.
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub cluster_name: String,
    pub nodes: Vec<NodeSummary>,
    pub registry: Option<RegistrySummary>,
    pub addons: Vec<AddonSummary>,
    pub sources: Vec<SourceSummary>,
    pub kustomizations: Vec<KustomizationSummary>,
    pub apps: Vec<AppSummary>,
    pub health: HealthReport,
}

#[derive(Debug, Serialize)]
pub struct NodeSummary {
    pub name: String,
    pub role: String,
    pub ready: bool,
}

#[derive(Debug, Serialize)]
pub struct RegistrySummary {
    pub running: bool,
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AddonSummary {
    pub name: String,
    pub ready: bool,
    pub version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub icon: StatusIcon,
    pub revision: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct KustomizationSummary {
    pub name: String,
    pub icon: StatusIcon,
    pub stack: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AppSummary {
    pub name: String,
    pub namespace: String,
    pub stack: Option<String>,
    pub workloads: Vec<WorkloadSummary>,
    pub services: Vec<ServiceSummary>,
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct WorkloadSummary {
    pub name: String,
    pub kind: String,
    pub replicas: String,
    pub ready: bool,
    pub version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ServiceSummary {
    pub name: String,
    pub service_type: String,
    pub external: Option<String>,
    pub pending: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub summary: String,
    pub issues: Vec<String>,
}

/// A labeled workload, reduced to what the health check needs.
#[derive(Debug)]
struct WorkloadHealth {
    namespace: String,
    name: String,
    ready: bool,
    replicas: (i32, i32),
}

/// Gathers the full status snapshot. A missing or unreachable Flux installation degrades the
/// GitOps sections to empty rather than failing the whole report.
pub async fn collect(manager: &ClusterManager, settings: &Settings) -> Result<StatusSnapshot> {
    let nodes = collect_nodes(manager).await?;
    let registry = collect_registry(settings).await;
    let addons = collect_addons(manager, settings).await?;
    let (sources, kustomizations) = collect_gitops(manager).await;
    let apps = collect_apps(manager).await?;
    let workloads = collect_labeled_workloads(manager).await?;
    let health = derive_health(&kustomizations, &workloads);

    Ok(StatusSnapshot {
        cluster_name: settings.cluster_name.clone(),
        nodes,
        registry,
        addons,
        sources,
        kustomizations,
        apps,
        health,
    })
}

async fn collect_nodes(manager: &ClusterManager) -> Result<Vec<NodeSummary>> {
    let nodes = manager
        .api::<Node>()
        .list(&ListParams::default())
        .await
        .context(KubeSnafu {
            action: "list nodes",
        })?;
    Ok(nodes
        .items
        .iter()
        .map(|node| NodeSummary {
            name: node.name_any(),
            role: if node.labels().contains_key(CONTROL_PLANE_LABEL) {
                "control-plane".to_string()
            } else {
                "worker".to_string()
            },
            ready: node_ready(node),
        })
        .collect())
}

async fn collect_registry(settings: &Settings) -> Option<RegistrySummary> {
    if !settings.registry_enabled {
        return None;
    }
    let docker = Docker;
    if !docker.container_exists(REGISTRY_CONTAINER).await {
        return Some(RegistrySummary {
            running: false,
            address: None,
        });
    }
    let running = matches!(
        docker.container_state(REGISTRY_CONTAINER).await.as_deref(),
        Ok("running")
    );
    let address = match docker.container_ports(REGISTRY_CONTAINER).await {
        Ok(ports) => ports.get(&5000).map(|host| format!("localhost:{}", host)),
        Err(e) => {
            warn!("Unable to read registry ports: {}", e);
            None
        }
    };
    Some(RegistrySummary { running, address })
}

async fn collect_addons(
    manager: &ClusterManager,
    settings: &Settings,
) -> Result<Vec<AddonSummary>> {
    let mut addons = Vec::new();
    if !settings.metrics_disabled {
        addons.push(deployment_addon(manager, "metrics-server", METRICS_SERVER, "kube-system").await?);
    }
    if settings.metallb_enabled {
        addons.push(deployment_addon(manager, "metallb", METALLB_CONTROLLER, NAMESPACE).await?);
    }
    if settings.ingress_enabled {
        addons.push(deployment_addon(manager, "ingress-nginx", INGRESS_CONTROLLER, NAMESPACE).await?);
    }
    if settings.vault_enabled {
        addons.push(statefulset_addon(manager, "vault", VAULT_STATEFULSET, NAMESPACE).await?);
    }
    if settings.flux_enabled {
        addons.push(
            deployment_addon(manager, "flux", FLUX_SOURCE_CONTROLLER, FLUX_NAMESPACE).await?,
        );
    }
    Ok(addons)
}

async fn deployment_addon(
    manager: &ClusterManager,
    addon: &str,
    deployment_name: &str,
    namespace: &str,
) -> Result<AddonSummary> {
    let api: Api<Deployment> = manager.namespaced_api(namespace);
    let deployment = api.get_opt(deployment_name).await.context(KubeSnafu {
        action: format!("get deployment '{}/{}'", namespace, deployment_name),
    })?;
    Ok(match deployment {
        Some(deployment) => AddonSummary {
            name: addon.to_string(),
            ready: deployment_ready(&deployment),
            version: first_image_version(
                deployment
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.template.spec.as_ref()),
            ),
        },
        None => AddonSummary {
            name: addon.to_string(),
            ready: false,
            version: None,
        },
    })
}

async fn statefulset_addon(
    manager: &ClusterManager,
    addon: &str,
    statefulset_name: &str,
    namespace: &str,
) -> Result<AddonSummary> {
    let api: Api<StatefulSet> = manager.namespaced_api(namespace);
    let statefulset = api.get_opt(statefulset_name).await.context(KubeSnafu {
        action: format!("get statefulset '{}/{}'", namespace, statefulset_name),
    })?;
    Ok(match statefulset {
        Some(statefulset) => AddonSummary {
            name: addon.to_string(),
            ready: derive::statefulset_ready(&statefulset),
            version: first_image_version(
                statefulset
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.template.spec.as_ref()),
            ),
        },
        None => AddonSummary {
            name: addon.to_string(),
            ready: false,
            version: None,
        },
    })
}

fn first_image_version(pod_spec: Option<&k8s_openapi::api::core::v1::PodSpec>) -> Option<String> {
    pod_spec
        .and_then(|spec| spec.containers.first())
        .and_then(|container| container.image.as_deref())
        .and_then(image_version)
}

async fn collect_gitops(
    manager: &ClusterManager,
) -> (Vec<SourceSummary>, Vec<KustomizationSummary>) {
    let flux = FluxClient::new_from_k8s_client(manager.k8s_client.clone());

    let sources = match flux.git_repositories().await {
        Ok(repositories) => repositories
            .iter()
            .map(|repository| {
                let suspended = repository.spec.suspend == Some(true);
                let ready = repository
                    .status
                    .as_ref()
                    .and_then(|status| ready_condition(status.conditions.as_ref()));
                SourceSummary {
                    name: repository.name_any(),
                    icon: if suspended {
                        StatusIcon::Paused
                    } else {
                        icon_from_ready(ready)
                    },
                    revision: repository
                        .status
                        .as_ref()
                        .and_then(|status| status.artifact.as_ref())
                        .and_then(|artifact| artifact.revision.clone()),
                }
            })
            .collect(),
        Err(e) => {
            warn!("GitOps sources unavailable: {}", e);
            Vec::new()
        }
    };

    let kustomizations = match flux.kustomizations().await {
        Ok(kustomizations) => kustomizations
            .iter()
            .map(|kustomization| KustomizationSummary {
                name: kustomization.name_any(),
                icon: kustomization_icon(kustomization),
                stack: kustomization.labels().get(LABEL_STACK).cloned(),
                message: kustomization
                    .status
                    .as_ref()
                    .and_then(|status| ready_condition(status.conditions.as_ref()))
                    .and_then(|condition| condition.message.clone()),
            })
            .collect(),
        Err(e) => {
            warn!("GitOps kustomizations unavailable: {}", e);
            Vec::new()
        }
    };

    (sources, kustomizations)
}

async fn collect_apps(manager: &ClusterManager) -> Result<Vec<AppSummary>> {
    let mut groups: BTreeMap<(String, String), AppSummary> = BTreeMap::new();
    let mut seen: HashSet<(String, String, String)> = HashSet::new();

    for label in [LABEL_APP, LABEL_APPLICATION] {
        let params = ListParams::default().labels(label);

        let deployments = manager
            .api::<Deployment>()
            .list(&params)
            .await
            .context(KubeSnafu {
                action: format!("list deployments labeled '{}'", label),
            })?;
        for deployment in &deployments.items {
            let key = (
                deployment.namespace().unwrap_or_default(),
                deployment.name_any(),
                "Deployment".to_string(),
            );
            if !seen.insert(key) {
                continue;
            }
            let (ready, desired) = deployment_replicas(deployment);
            add_workload(
                &mut groups,
                deployment.labels(),
                label,
                deployment.namespace().unwrap_or_default(),
                WorkloadSummary {
                    name: deployment.name_any(),
                    kind: "Deployment".to_string(),
                    replicas: format!("{}/{}", ready, desired),
                    ready: deployment_ready(deployment),
                    version: first_image_version(
                        deployment
                            .spec
                            .as_ref()
                            .and_then(|spec| spec.template.spec.as_ref()),
                    ),
                },
            );
        }

        let statefulsets = manager
            .api::<StatefulSet>()
            .list(&params)
            .await
            .context(KubeSnafu {
                action: format!("list statefulsets labeled '{}'", label),
            })?;
        for statefulset in &statefulsets.items {
            let key = (
                statefulset.namespace().unwrap_or_default(),
                statefulset.name_any(),
                "StatefulSet".to_string(),
            );
            if !seen.insert(key) {
                continue;
            }
            let (ready, desired) = derive::statefulset_replicas(statefulset);
            add_workload(
                &mut groups,
                statefulset.labels(),
                label,
                statefulset.namespace().unwrap_or_default(),
                WorkloadSummary {
                    name: statefulset.name_any(),
                    kind: "StatefulSet".to_string(),
                    replicas: format!("{}/{}", ready, desired),
                    ready: derive::statefulset_ready(statefulset),
                    version: first_image_version(
                        statefulset
                            .spec
                            .as_ref()
                            .and_then(|spec| spec.template.spec.as_ref()),
                    ),
                },
            );
        }
    }

    // Services and ingresses carry the same label their workloads do, manual or GitOps.
    for label in [LABEL_APP, LABEL_APPLICATION] {
        let params = ListParams::default().labels(label);

        let services = manager
            .api::<Service>()
            .list(&params)
            .await
            .context(KubeSnafu {
                action: format!("list services labeled '{}'", label),
            })?;
        for service in &services.items {
            let key = (
                service.namespace().unwrap_or_default(),
                service.name_any(),
                "Service".to_string(),
            );
            if !seen.insert(key) {
                continue;
            }
            if let Some(group) = find_group(&mut groups, service.labels(), label, service.namespace())
            {
                group.services.push(ServiceSummary {
                    name: service.name_any(),
                    service_type: service
                        .spec
                        .as_ref()
                        .and_then(|spec| spec.type_.clone())
                        .unwrap_or_else(|| "ClusterIP".to_string()),
                    external: service_external_address(service),
                    pending: service_pending(service),
                });
            }
        }

        let ingresses = manager
            .api::<Ingress>()
            .list(&params)
            .await
            .context(KubeSnafu {
                action: format!("list ingresses labeled '{}'", label),
            })?;
        for ingress in &ingresses.items {
            let key = (
                ingress.namespace().unwrap_or_default(),
                ingress.name_any(),
                "Ingress".to_string(),
            );
            if !seen.insert(key) {
                continue;
            }
            if let Some(group) = find_group(&mut groups, ingress.labels(), label, ingress.namespace())
            {
                group.urls.extend(ingress_urls(ingress));
            }
        }
    }

    Ok(groups.into_values().collect())
}

fn add_workload(
    groups: &mut BTreeMap<(String, String), AppSummary>,
    labels: &BTreeMap<String, String>,
    label: &str,
    namespace: String,
    workload: WorkloadSummary,
) {
    let app = match labels.get(label) {
        Some(app) => app.clone(),
        None => return,
    };
    let stack = labels.get(LABEL_STACK).cloned();
    groups
        .entry((app.clone(), namespace.clone()))
        .or_insert_with(|| AppSummary {
            name: app,
            namespace,
            stack,
            workloads: Vec::new(),
            services: Vec::new(),
            urls: Vec::new(),
        })
        .workloads
        .push(workload);
}

fn find_group<'a>(
    groups: &'a mut BTreeMap<(String, String), AppSummary>,
    labels: &BTreeMap<String, String>,
    label: &str,
    namespace: Option<String>,
) -> Option<&'a mut AppSummary> {
    let app = labels.get(label)?.clone();
    let namespace = namespace.unwrap_or_default();
    Some(groups.entry((app.clone(), namespace.clone())).or_insert_with(|| {
        AppSummary {
            name: app,
            namespace,
            stack: labels.get(LABEL_STACK).cloned(),
            workloads: Vec::new(),
            services: Vec::new(),
            urls: Vec::new(),
        }
    }))
}

/// Every workload carrying one of our ownership labels, for the health check.
async fn collect_labeled_workloads(manager: &ClusterManager) -> Result<Vec<WorkloadHealth>> {
    let mut workloads = Vec::new();
    let mut seen: HashSet<(String, String, String)> = HashSet::new();

    for label in [LABEL_COMPONENT, LABEL_APPLICATION, LABEL_APP] {
        let params = ListParams::default().labels(label);

        let deployments = manager
            .api::<Deployment>()
            .list(&params)
            .await
            .context(KubeSnafu {
                action: format!("list deployments labeled '{}'", label),
            })?;
        for deployment in &deployments.items {
            let namespace = deployment.namespace().unwrap_or_default();
            let name = deployment.name_any();
            if !seen.insert((namespace.clone(), name.clone(), "Deployment".to_string())) {
                continue;
            }
            workloads.push(WorkloadHealth {
                namespace,
                name,
                ready: deployment_ready(deployment),
                replicas: deployment_replicas(deployment),
            });
        }

        let statefulsets = manager
            .api::<StatefulSet>()
            .list(&params)
            .await
            .context(KubeSnafu {
                action: format!("list statefulsets labeled '{}'", label),
            })?;
        for statefulset in &statefulsets.items {
            let namespace = statefulset.namespace().unwrap_or_default();
            let name = statefulset.name_any();
            if !seen.insert((namespace.clone(), name.clone(), "StatefulSet".to_string())) {
                continue;
            }
            workloads.push(WorkloadHealth {
                namespace,
                name,
                ready: derive::statefulset_ready(statefulset),
                replicas: derive::statefulset_replicas(statefulset),
            });
        }
    }

    Ok(workloads)
}

/// While any unsuspended kustomization is still converging, report progress instead of failures.
/// Once reconciliation has settled, the report lists every unhealthy labeled workload.
fn derive_health(
    kustomizations: &[KustomizationSummary],
    workloads: &[WorkloadHealth],
) -> HealthReport {
    let active: Vec<&KustomizationSummary> = kustomizations
        .iter()
        .filter(|k| k.icon != StatusIcon::Paused)
        .collect();
    let in_progress = active
        .iter()
        .any(|k| matches!(k.icon, StatusIcon::Waiting | StatusIcon::Unknown));
    if in_progress {
        let ready = active.iter().filter(|k| k.icon == StatusIcon::Ok).count();
        return HealthReport {
            healthy: false,
            summary: format!("{} of {} components ready", ready, active.len()),
            issues: Vec::new(),
        };
    }

    let mut issues: Vec<String> = active
        .iter()
        .filter(|k| k.icon == StatusIcon::Fail)
        .map(|k| match &k.message {
            Some(message) => format!("kustomization {}: {}", k.name, message),
            None => format!("kustomization {}: not ready", k.name),
        })
        .collect();
    issues.extend(workloads.iter().filter(|w| !w.ready).map(|w| {
        format!(
            "{}/{} ({}/{})",
            w.namespace, w.name, w.replicas.0, w.replicas.1
        )
    }));

    HealthReport {
        healthy: issues.is_empty(),
        summary: if issues.is_empty() {
            "all components healthy".to_string()
        } else {
            format!("{} components unhealthy", issues.len())
        },
        issues,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn kustomization(name: &str, icon: StatusIcon, message: Option<&str>) -> KustomizationSummary {
        KustomizationSummary {
            name: name.to_string(),
            icon,
            stack: None,
            message: message.map(str::to_string),
        }
    }

    fn workload(namespace: &str, name: &str, ready: i32, desired: i32) -> WorkloadHealth {
        WorkloadHealth {
            namespace: namespace.to_string(),
            name: name.to_string(),
            ready: desired > 0 && ready == desired,
            replicas: (ready, desired),
        }
    }

    #[test]
    fn converging_kustomizations_short_circuit_health() {
        let kustomizations = vec![
            kustomization("bootstrap-sample", StatusIcon::Ok, None),
            kustomization(
                "app-stack",
                StatusIcon::Waiting,
                Some("dependency 'flux-system/bootstrap-sample' is not ready"),
            ),
        ];
        let report = derive_health(&kustomizations, &[workload("default", "api", 0, 2)]);
        assert!(!report.healthy);
        assert_eq!(report.summary, "1 of 2 components ready");
        assert!(report.issues.is_empty());
    }

    #[test]
    fn paused_kustomizations_are_ignored() {
        let kustomizations = vec![kustomization("app-stack", StatusIcon::Paused, None)];
        let report = derive_health(&kustomizations, &[]);
        assert!(report.healthy);
        assert_eq!(report.summary, "all components healthy");
    }

    #[test]
    fn settled_cluster_reports_unhealthy_workloads() {
        let kustomizations = vec![kustomization("app-stack", StatusIcon::Ok, None)];
        let workloads = vec![
            workload("default", "api", 2, 2),
            workload("default", "worker", 1, 2),
        ];
        let report = derive_health(&kustomizations, &workloads);
        assert!(!report.healthy);
        assert_eq!(report.issues, vec!["default/worker (1/2)"]);
    }

    #[test]
    fn failed_kustomization_is_an_issue() {
        let kustomizations = vec![kustomization(
            "app-stack",
            StatusIcon::Fail,
            Some("kustomize build failed"),
        )];
        let report = derive_health(&kustomizations, &[]);
        assert!(!report.healthy);
        assert_eq!(
            report.issues,
            vec!["kustomization app-stack: kustomize build failed"]
        );
    }

    #[test]
    fn empty_cluster_is_healthy() {
        let report = derive_health(&[], &[]);
        assert!(report.healthy);
    }

    fn workload_summary(name: &str) -> WorkloadSummary {
        WorkloadSummary {
            name: name.to_string(),
            kind: "Deployment".to_string(),
            replicas: "1/1".to_string(),
            ready: true,
            version: None,
        }
    }

    #[test]
    fn gitops_labeled_services_join_their_app_group() {
        let mut groups: BTreeMap<(String, String), AppSummary> = BTreeMap::new();
        let labels: BTreeMap<String, String> =
            [(LABEL_APPLICATION.to_string(), "voting-app".to_string())]
                .into_iter()
                .collect();

        add_workload(
            &mut groups,
            &labels,
            LABEL_APPLICATION,
            "default".to_string(),
            workload_summary("vote"),
        );
        let group = find_group(
            &mut groups,
            &labels,
            LABEL_APPLICATION,
            Some("default".to_string()),
        )
        .unwrap();
        assert_eq!(group.name, "voting-app");
        assert_eq!(group.workloads.len(), 1);
        assert_eq!(groups.len(), 1);
    }

    #[test]
    fn manual_labeled_services_join_their_app_group() {
        let mut groups: BTreeMap<(String, String), AppSummary> = BTreeMap::new();
        let labels: BTreeMap<String, String> = [(LABEL_APP.to_string(), "demo".to_string())]
            .into_iter()
            .collect();

        add_workload(
            &mut groups,
            &labels,
            LABEL_APP,
            "default".to_string(),
            workload_summary("demo"),
        );
        assert!(find_group(&mut groups, &labels, LABEL_APP, Some("default".to_string())).is_some());
        // A service whose label key does not match the group's key starts no group of its own.
        assert!(find_group(&mut groups, &labels, LABEL_APPLICATION, None).is_none());
    }
}
