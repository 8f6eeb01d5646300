/*!

Add-on installers, sequenced from cluster bring-up. Each installer is idempotent and best-effort:
a failing add-on logs a warning and the rest continue, since the cluster itself is usable
without any of them.

!*/

use crate::config::Settings;
use crate::constants::{NAMESPACE, REGISTRY_CONTAINER};
use crate::manager::ClusterManager;
use crate::system::local_registry_hosting_config_map;
use crate::tools::{Docker, FluxCli, Helm, Kubectl, Result};
use log::{info, warn};
use std::path::Path;

const METRICS_SERVER_MANIFEST: &str = "infra/manifests/metrics-server.yaml";
const METALLB_FALLBACK_SUBNET: &str = "172.18.0.0/16";

/// Install every add-on the settings enable. Failures warn and continue.
pub async fn install_enabled(manager: &ClusterManager, settings: &Settings) {
    if !settings.metrics_disabled {
        if let Err(e) = install_metrics_server(settings).await {
            warn!("metrics-server setup failed, continuing: {}", e);
        }
    }
    if settings.metallb_enabled {
        if let Err(e) = install_metallb(settings).await {
            warn!("MetalLB setup failed, continuing: {}", e);
        }
    }
    if settings.ingress_enabled {
        if let Err(e) = install_ingress(manager, settings).await {
            warn!("ingress setup failed, continuing: {}", e);
        }
    }
    if settings.registry_enabled {
        if let Err(e) = finish_registry(manager, settings).await {
            warn!("registry setup failed, continuing: {}", e);
        }
    }
    if settings.vault_enabled {
        if let Err(e) = install_vault(settings).await {
            warn!("Vault setup failed, continuing: {}", e);
        }
    }
    if settings.flux_enabled {
        if let Err(e) = install_flux(settings).await {
            warn!("Flux setup failed, continuing: {}", e);
        }
    }
}

/// Apply the metrics-server manifest, kustomized for kind's self-signed kubelet certs.
async fn install_metrics_server(settings: &Settings) -> Result<()> {
    info!("installing metrics-server");
    let kubectl = Kubectl::new(&settings.kubeconfig_path);
    kubectl
        .apply_file(Path::new(METRICS_SERVER_MANIFEST), None)
        .await
}

/// Install MetalLB via helm and configure an address pool carved out of the kind docker network.
async fn install_metallb(settings: &Settings) -> Result<()> {
    info!("installing MetalLB");
    let helm = Helm::new(&settings.kubeconfig_path);
    helm.repo_add("metallb", "https://metallb.github.io/metallb")
        .await?;
    helm.repo_update().await?;
    helm.upgrade_install("metallb", "metallb/metallb", NAMESPACE, &[], &[])
        .await?;

    let subnet = match Docker.kind_network_subnet().await {
        Ok(Some(subnet)) => subnet,
        _ => {
            info!(
                "could not detect the kind network subnet, using {}",
                METALLB_FALLBACK_SUBNET
            );
            METALLB_FALLBACK_SUBNET.to_string()
        }
    };
    let pool = address_pool_manifest(&subnet);
    Kubectl::new(&settings.kubeconfig_path)
        .apply_stdin(&pool)
        .await
}

/// Install NGINX ingress via helm with the NodePorts the kind config forwards. Skipped when a
/// ready controller is already present, so `up` over an existing install is a no-op.
async fn install_ingress(manager: &ClusterManager, settings: &Settings) -> Result<()> {
    if manager.has_ingress_controller().await {
        info!("NGINX ingress controller already installed");
        return Ok(());
    }
    info!("installing NGINX ingress controller");
    let helm = Helm::new(&settings.kubeconfig_path);
    helm.repo_add("ingress-nginx", "https://kubernetes.github.io/ingress-nginx")
        .await?;
    helm.repo_update().await?;
    helm.upgrade_install(
        "ingress-nginx",
        "ingress-nginx/ingress-nginx",
        NAMESPACE,
        &[],
        &[
            ("controller.service.type", "NodePort"),
            ("controller.service.nodePorts.http", "30080"),
            ("controller.service.nodePorts.https", "30443"),
            ("controller.admissionWebhooks.enabled", "true"),
        ],
    )
    .await
}

/// Connect the already-running registry container to the kind network and advertise it with the
/// standard `local-registry-hosting` config map.
async fn finish_registry(manager: &ClusterManager, settings: &Settings) -> Result<()> {
    let docker = Docker;
    if !docker.container_exists(REGISTRY_CONTAINER).await {
        info!("registry container not present, skipping registry wiring");
        return Ok(());
    }
    docker.connect_registry_to_kind().await?;
    let config_map = local_registry_hosting_config_map(settings.registry_port);
    if let Err(e) = manager.create_or_update(&config_map, "registry config map").await {
        // Advisory only; tooling works without it.
        warn!("could not create local-registry-hosting config map: {}", e);
    }
    Ok(())
}

/// Install Vault in development mode via helm.
async fn install_vault(settings: &Settings) -> Result<()> {
    info!("installing Vault (dev mode)");
    let helm = Helm::new(&settings.kubeconfig_path);
    helm.repo_add("hashicorp", "https://helm.releases.hashicorp.com")
        .await?;
    helm.repo_update().await?;
    let dev_token = ("server.dev.devRootToken", settings.vault_token.as_str());
    helm.upgrade_install(
        "vault",
        "hashicorp/vault",
        NAMESPACE,
        &[],
        &[
            ("server.dev.enabled", "true"),
            dev_token,
            ("injector.enabled", "false"),
            ("server.resources.requests.memory", "64Mi"),
            ("server.resources.requests.cpu", "10m"),
            ("server.resources.limits.memory", "128Mi"),
            ("server.resources.limits.cpu", "100m"),
            ("ui.enabled", "true"),
            ("ui.serviceType", "ClusterIP"),
        ],
    )
    .await
}

/// Install the Flux controllers with the flux CLI.
async fn install_flux(settings: &Settings) -> Result<()> {
    FluxCli::new(&settings.kubeconfig_path).install().await
}

fn address_pool_manifest(subnet: &str) -> String {
    // 172.18.0.0/16 -> 172.18.200.200-172.18.200.250
    let prefix: String = subnet
        .split('/')
        .next()
        .unwrap_or(subnet)
        .split('.')
        .take(2)
        .collect::<Vec<_>>()
        .join(".");
    format!(
        r#"apiVersion: metallb.io/v1beta1
kind: IPAddressPool
metadata:
  name: kind-pool
  namespace: {ns}
spec:
  addresses:
  - {prefix}.200.200-{prefix}.200.250
---
apiVersion: metallb.io/v1beta1
kind: L2Advertisement
metadata:
  name: kind-l2
  namespace: {ns}
spec:
  ipAddressPools:
  - kind-pool
"#,
        ns = NAMESPACE,
        prefix = prefix
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn address_pool_range_from_subnet() {
        let manifest = address_pool_manifest("10.89.0.0/16");
        assert!(manifest.contains("10.89.200.200-10.89.200.250"));
        assert!(manifest.contains("namespace: hostk8s"));
    }
}
