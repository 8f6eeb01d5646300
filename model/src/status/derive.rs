//! Pure derivations from typed Kubernetes objects to status facts. Everything here is a
//! function of its inputs so the rules can be tested without a cluster.

use crate::flux::{ready_condition, Condition, Kustomization};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// The compact state icon shown for a GitOps object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusIcon {
    Ok,
    Paused,
    Waiting,
    Fail,
    Unknown,
}

impl fmt::Display for StatusIcon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusIcon::Ok => "[OK]",
            StatusIcon::Paused => "[PAUSED]",
            StatusIcon::Waiting => "[WAITING]",
            StatusIcon::Fail => "[FAIL]",
            StatusIcon::Unknown => "[...]",
        };
        write!(f, "{}", s)
    }
}

/// Ready and desired replica counts of a deployment.
pub fn deployment_replicas(deployment: &Deployment) -> (i32, i32) {
    let status = deployment.status.as_ref();
    let ready = status.and_then(|s| s.ready_replicas).unwrap_or(0);
    let desired = status.and_then(|s| s.replicas).unwrap_or(0);
    (ready, desired)
}

/// A deployment is ready only when every desired replica is ready and at least one is desired.
pub fn deployment_ready(deployment: &Deployment) -> bool {
    let (ready, desired) = deployment_replicas(deployment);
    desired > 0 && ready == desired
}

pub fn statefulset_replicas(statefulset: &StatefulSet) -> (i32, i32) {
    let status = statefulset.status.as_ref();
    let ready = status.and_then(|s| s.ready_replicas).unwrap_or(0);
    let desired = status.map(|s| s.replicas).unwrap_or(0);
    (ready, desired)
}

pub fn statefulset_ready(statefulset: &StatefulSet) -> bool {
    let (ready, desired) = statefulset_replicas(statefulset);
    desired > 0 && ready == desired
}

/// A pod counts as healthy while running or after finishing successfully.
pub fn pod_healthy(pod: &Pod) -> bool {
    matches!(
        pod.status
            .as_ref()
            .and_then(|status| status.phase.as_deref()),
        Some("Running") | Some("Succeeded")
    )
}

/// A LoadBalancer service is pending until an ingress address is assigned.
pub fn service_pending(service: &Service) -> bool {
    let is_lb = service
        .spec
        .as_ref()
        .and_then(|spec| spec.type_.as_deref())
        == Some("LoadBalancer");
    if !is_lb {
        return false;
    }
    service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| ingress.is_empty())
        .unwrap_or(true)
}

/// The external address of a LoadBalancer service, once assigned.
pub fn service_external_address(service: &Service) -> Option<String> {
    service
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .and_then(|ingress| ingress.first())
        .and_then(|entry| entry.ip.clone().or_else(|| entry.hostname.clone()))
}

/// Strip an NGINX rewrite pattern down to its user-facing prefix:
/// `/api(/|$)(.*)` becomes `/api`.
pub fn clean_ingress_path(path: &str) -> String {
    if path.starts_with('/') {
        match path.split('(').next() {
            Some(prefix) if !prefix.is_empty() => prefix.to_string(),
            _ => "/".to_string(),
        }
    } else {
        path.to_string()
    }
}

/// Access URLs for an ingress: the first rule's host (or localhost) combined with its cleaned
/// paths on the forwarded HTTP port, plus an `https://` variant when TLS is configured.
pub fn ingress_urls(ingress: &Ingress) -> Vec<String> {
    let rule = ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.rules.as_ref())
        .and_then(|rules| rules.first());

    let host = rule
        .and_then(|rule| rule.host.as_deref())
        .filter(|host| !host.is_empty() && *host != "*")
        .unwrap_or("localhost");

    let mut paths: Vec<String> = rule
        .and_then(|rule| rule.http.as_ref())
        .map(|http| {
            http.paths
                .iter()
                .filter_map(|p| p.path.as_deref())
                .map(clean_ingress_path)
                .collect()
        })
        .unwrap_or_default();
    if paths.is_empty() {
        paths.push("/".to_string());
    }

    let has_tls = ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.tls.as_ref())
        .map(|tls| !tls.is_empty())
        .unwrap_or(false);

    let mut urls = Vec::new();
    for path in &paths {
        urls.push(format!("http://{}:8080{}", host, normalize_path(path)));
    }
    if has_tls {
        for path in &paths {
            urls.push(format!("https://{}:8443{}", host, normalize_path(path)));
        }
    }
    urls
}

fn normalize_path(path: &str) -> String {
    if path == "/" {
        "/".to_string()
    } else {
        path.trim_end_matches('/').to_string()
    }
}

/// Version tag from a container image reference, cutting off any digest:
/// `registry.k8s.io/metrics-server:v0.7.2@sha256:abc` yields `v0.7.2`.
pub fn image_version(image: &str) -> Option<String> {
    // The digest comes off first; it contains a ':' of its own.
    let image = image.split('@').next().unwrap_or(image);
    let tag = image.rsplit(':').next()?;
    // No tag at all (rsplit returned the whole ref), or the ':' was a registry port.
    if tag == image || tag.contains('/') {
        return None;
    }
    Some(tag.to_string())
}

/// The icon for a kustomization. Suspension wins over everything; a not-ready object waiting on
/// a dependency shows `[WAITING]` rather than `[FAIL]`.
pub fn kustomization_icon(kustomization: &Kustomization) -> StatusIcon {
    if kustomization.spec.suspend == Some(true) {
        return StatusIcon::Paused;
    }
    let ready = kustomization
        .status
        .as_ref()
        .and_then(|status| ready_condition(status.conditions.as_ref()));
    icon_from_ready(ready)
}

pub(crate) fn icon_from_ready(ready: Option<&Condition>) -> StatusIcon {
    match ready {
        Some(condition) if condition.status == "True" => StatusIcon::Ok,
        Some(condition) => {
            let message = condition.message.as_deref().unwrap_or("");
            if waiting_on_dependency(message) {
                StatusIcon::Waiting
            } else {
                StatusIcon::Fail
            }
        }
        None => StatusIcon::Unknown,
    }
}

const DEPENDENCY_NOT_READY_REGEX: &str = r"dependency .* is not ready";

lazy_static::lazy_static! {
    static ref DEPENDENCY_NOT_READY: Regex = {
        #[allow(clippy::unwrap_used)]
        Regex::new(DEPENDENCY_NOT_READY_REGEX).unwrap()
    };
}

fn waiting_on_dependency(message: &str) -> bool {
    // "dependency 'flux-system/bootstrap' is not ready"
    DEPENDENCY_NOT_READY.is_match(message)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::flux::{KustomizationSpec, SourceRef};
    use k8s_openapi::api::apps::v1::DeploymentStatus;
    use k8s_openapi::api::core::v1::{
        LoadBalancerIngress, LoadBalancerStatus, PodStatus, ServiceSpec, ServiceStatus,
    };
    use k8s_openapi::api::networking::v1::{
        HTTPIngressPath, HTTPIngressRuleValue, IngressBackend, IngressRule, IngressSpec,
        IngressTLS,
    };

    fn deployment(ready: i32, desired: i32) -> Deployment {
        Deployment {
            status: Some(DeploymentStatus {
                ready_replicas: Some(ready),
                replicas: Some(desired),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn kustomization_with(suspend: Option<bool>, ready: Option<Condition>) -> Kustomization {
        let mut kustomization = Kustomization::new(
            "demo",
            KustomizationSpec {
                interval: "1m".to_string(),
                path: None,
                prune: true,
                source_ref: SourceRef {
                    kind: "GitRepository".to_string(),
                    name: "flux-system".to_string(),
                    namespace: None,
                },
                suspend,
                depends_on: None,
                target_namespace: None,
                wait: None,
                timeout: None,
            },
        );
        kustomization.status = Some(crate::flux::KustomizationStatus {
            conditions: ready.map(|c| vec![c]),
            last_applied_revision: None,
        });
        kustomization
    }

    #[test]
    fn deployment_fully_ready() {
        assert!(deployment_ready(&deployment(2, 2)));
    }

    #[test]
    fn deployment_partially_ready() {
        let d = deployment(1, 2);
        assert!(!deployment_ready(&d));
        assert_eq!(deployment_replicas(&d), (1, 2));
    }

    #[test]
    fn deployment_zero_desired_is_not_ready() {
        assert!(!deployment_ready(&deployment(0, 0)));
        assert!(!deployment_ready(&Deployment::default()));
    }

    #[test]
    fn pod_phases() {
        let mut pod = Pod::default();
        for (phase, healthy) in [
            ("Running", true),
            ("Succeeded", true),
            ("Pending", false),
            ("Failed", false),
        ] {
            pod.status = Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            });
            assert_eq!(pod_healthy(&pod), healthy, "phase {}", phase);
        }
        assert!(!pod_healthy(&Pod::default()));
    }

    fn load_balancer(ingress: Option<Vec<LoadBalancerIngress>>) -> Service {
        Service {
            spec: Some(ServiceSpec {
                type_: Some("LoadBalancer".to_string()),
                ..Default::default()
            }),
            status: Some(ServiceStatus {
                load_balancer: Some(LoadBalancerStatus { ingress }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn load_balancer_without_address_is_pending() {
        assert!(service_pending(&load_balancer(None)));
        assert!(service_pending(&load_balancer(Some(vec![]))));
    }

    #[test]
    fn load_balancer_with_address_is_not_pending() {
        let service = load_balancer(Some(vec![LoadBalancerIngress {
            ip: Some("172.18.200.200".to_string()),
            ..Default::default()
        }]));
        assert!(!service_pending(&service));
        assert_eq!(
            service_external_address(&service).unwrap(),
            "172.18.200.200"
        );
    }

    #[test]
    fn cluster_ip_service_is_never_pending() {
        let service = Service {
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!service_pending(&service));
    }

    #[test]
    fn regex_paths_are_cleaned() {
        assert_eq!(clean_ingress_path("/api(/|$)(.*)"), "/api");
        assert_eq!(clean_ingress_path("/plain"), "/plain");
        assert_eq!(clean_ingress_path("/"), "/");
    }

    fn ingress(host: Option<&str>, paths: Vec<&str>, tls: bool) -> Ingress {
        Ingress {
            spec: Some(IngressSpec {
                rules: Some(vec![IngressRule {
                    host: host.map(str::to_string),
                    http: Some(HTTPIngressRuleValue {
                        paths: paths
                            .into_iter()
                            .map(|p| HTTPIngressPath {
                                path: Some(p.to_string()),
                                path_type: "Prefix".to_string(),
                                backend: IngressBackend::default(),
                            })
                            .collect(),
                    }),
                }]),
                tls: tls.then(|| vec![IngressTLS::default()]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn ingress_url_from_host_and_path() {
        let urls = ingress_urls(&ingress(Some("app.localhost"), vec!["/web(/|$)(.*)"], false));
        assert_eq!(urls, vec!["http://app.localhost:8080/web"]);
    }

    #[test]
    fn ingress_root_path_renders_bare_base() {
        let urls = ingress_urls(&ingress(None, vec!["/"], false));
        assert_eq!(urls, vec!["http://localhost:8080/"]);
    }

    #[test]
    fn ingress_tls_adds_https_variant() {
        let urls = ingress_urls(&ingress(Some("secure.localhost"), vec!["/"], true));
        assert_eq!(
            urls,
            vec![
                "http://secure.localhost:8080/",
                "https://secure.localhost:8443/"
            ]
        );
    }

    #[test]
    fn image_version_extraction() {
        assert_eq!(
            image_version("registry.k8s.io/metrics-server/metrics-server:v0.7.2@sha256:abc123")
                .unwrap(),
            "v0.7.2"
        );
        assert_eq!(image_version("nginx:1.25").unwrap(), "1.25");
        assert_eq!(image_version("registry.k8s.io/pause"), None);
    }

    #[test]
    fn suspended_kustomization_is_paused() {
        let k = kustomization_with(
            Some(true),
            Some(Condition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }),
        );
        assert_eq!(kustomization_icon(&k), StatusIcon::Paused);
    }

    #[test]
    fn ready_kustomization_is_ok() {
        let k = kustomization_with(
            None,
            Some(Condition {
                type_: "Ready".to_string(),
                status: "True".to_string(),
                ..Default::default()
            }),
        );
        assert_eq!(kustomization_icon(&k), StatusIcon::Ok);
    }

    #[test]
    fn dependency_wait_is_waiting_not_fail() {
        let k = kustomization_with(
            None,
            Some(Condition {
                type_: "Ready".to_string(),
                status: "False".to_string(),
                message: Some("dependency 'flux-system/bootstrap-sample' is not ready".to_string()),
                ..Default::default()
            }),
        );
        assert_eq!(kustomization_icon(&k), StatusIcon::Waiting);
    }

    #[test]
    fn failed_kustomization_is_fail() {
        let k = kustomization_with(
            None,
            Some(Condition {
                type_: "Ready".to_string(),
                status: "False".to_string(),
                message: Some("kustomize build failed".to_string()),
                ..Default::default()
            }),
        );
        assert_eq!(kustomization_icon(&k), StatusIcon::Fail);
    }

    #[test]
    fn unknown_state_icon() {
        let k = kustomization_with(None, None);
        assert_eq!(kustomization_icon(&k), StatusIcon::Unknown);
    }
}
