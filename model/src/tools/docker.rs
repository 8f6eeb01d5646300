use super::error::{OutputJsonSnafu, Result};
use super::{run, run_in_dir, stdout_string};
use crate::constants::{KIND_NETWORK, REGISTRY_CONTAINER};
use log::{debug, info, warn};
use serde::Deserialize;
use snafu::ResultExt;
use std::collections::HashMap;
use std::path::Path;

/// Host docker resource allocation, from `docker system info`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SystemResources {
    #[serde(rename = "MemTotal")]
    pub memory_bytes: u64,
    #[serde(rename = "NCPU")]
    pub cpus: u32,
}

impl SystemResources {
    pub fn memory_gb(&self) -> f64 {
        self.memory_bytes as f64 / (1024u64.pow(3)) as f64
    }
}

/// Wrapper over the `docker` CLI for the local registry container and host validation.
#[derive(Debug, Default, Clone, Copy)]
pub struct Docker;

impl Docker {
    /// Returns true when the docker daemon is reachable.
    pub async fn is_running(&self) -> bool {
        run("docker", ["info"], &[]).await.is_ok()
    }

    pub async fn system_resources(&self) -> Result<SystemResources> {
        let output = run("docker", ["system", "info", "--format", "json"], &[]).await?;
        serde_json::from_str(&stdout_string(&output)).context(OutputJsonSnafu { tool: "docker" })
    }

    /// Log warnings when docker has less memory or fewer CPUs than kind comfortably needs.
    pub async fn warn_on_low_resources(&self) {
        match self.system_resources().await {
            Ok(resources) => {
                debug!(
                    "docker resources: {:.1}GB memory, {} CPUs",
                    resources.memory_gb(),
                    resources.cpus
                );
                if resources.memory_gb() < 4.0 {
                    warn!(
                        "docker has only {:.1}GB memory allocated, recommend 4GB+",
                        resources.memory_gb()
                    );
                }
                if resources.cpus < 2 {
                    warn!(
                        "docker has only {} CPUs allocated, recommend 2+",
                        resources.cpus
                    );
                }
            }
            Err(e) => debug!("could not retrieve docker system information: {}", e),
        }
    }

    pub async fn container_exists(&self, name: &str) -> bool {
        run("docker", ["inspect", name], &[]).await.is_ok()
    }

    pub async fn container_state(&self, name: &str) -> Result<String> {
        let output = run(
            "docker",
            ["inspect", "-f", "{{.State.Status}}", name],
            &[],
        )
        .await?;
        Ok(stdout_string(&output))
    }

    /// Remove a container. Removing a nonexistent container is a successful no-op.
    pub async fn remove_container(&self, name: &str) -> Result<()> {
        if !self.container_exists(name).await {
            return Ok(());
        }
        info!("removing container '{}'", name);
        run("docker", ["rm", "-f", name], &[]).await?;
        Ok(())
    }

    /// Start the local registry container, bound to `port` on the host with its data directory
    /// mounted from `data_dir`.
    pub async fn run_registry(&self, port: u16, data_dir: &Path) -> Result<()> {
        let publish = format!("{}:5000", port);
        let volume = format!("{}:/var/lib/registry", data_dir.display());
        run(
            "docker",
            [
                "run",
                "-d",
                "--restart=always",
                "-p",
                &publish,
                "-v",
                &volume,
                "--name",
                REGISTRY_CONTAINER,
                "registry:2",
            ],
            &[],
        )
        .await?;
        Ok(())
    }

    /// Connect the registry container to the kind docker network so cluster nodes can reach it.
    pub async fn connect_registry_to_kind(&self) -> Result<()> {
        if let Some(network) = self.find_network(KIND_NETWORK).await? {
            info!("connecting registry to network: {}", network);
            // Already-connected is fine.
            let _ = run(
                "docker",
                ["network", "connect", &network, REGISTRY_CONTAINER],
                &[],
            )
            .await;
        }
        Ok(())
    }

    async fn find_network(&self, fragment: &str) -> Result<Option<String>> {
        let output = run(
            "docker",
            ["network", "ls", "--format", "{{.Name}}"],
            &[],
        )
        .await?;
        Ok(stdout_string(&output)
            .lines()
            .map(str::to_string)
            .find(|name| name.contains(fragment)))
    }

    /// The subnet (CIDR) of the kind docker network, used to derive a MetalLB address pool.
    pub async fn kind_network_subnet(&self) -> Result<Option<String>> {
        let output = run(
            "docker",
            [
                "network",
                "inspect",
                KIND_NETWORK,
                "-f",
                "{{range .IPAM.Config}}{{.Subnet}} {{end}}",
            ],
            &[],
        )
        .await?;
        Ok(stdout_string(&output)
            .split_whitespace()
            .map(str::to_string)
            .find(|subnet| subnet.contains('.')))
    }

    /// Host port mappings for a container, from `docker port` output lines like
    /// `30080/tcp -> 0.0.0.0:8081`.
    pub async fn container_ports(&self, name: &str) -> Result<HashMap<u16, u16>> {
        let output = run("docker", ["port", name], &[]).await?;
        Ok(parse_port_lines(&stdout_string(&output)))
    }

    /// `docker buildx bake --push` in an application directory. The bake file carries the image
    /// tags, so pushing lands in the local registry.
    pub async fn buildx_bake_push(&self, dir: &Path, envs: &[(&str, &str)]) -> Result<()> {
        run_in_dir("docker", ["buildx", "bake", "--push"], envs, dir).await?;
        Ok(())
    }

    pub async fn compose_build(&self, dir: &Path, envs: &[(&str, &str)]) -> Result<()> {
        run_in_dir("docker", ["compose", "build"], envs, dir).await?;
        Ok(())
    }

    pub async fn compose_push(&self, dir: &Path, envs: &[(&str, &str)]) -> Result<()> {
        run_in_dir("docker", ["compose", "push"], envs, dir).await?;
        Ok(())
    }
}

fn parse_port_lines(output: &str) -> HashMap<u16, u16> {
    let mut ports = HashMap::new();
    for line in output.lines() {
        let (container_part, host_part) = match line.split_once(" -> ") {
            Some(parts) => parts,
            None => continue,
        };
        let container_port = container_part
            .split('/')
            .next()
            .and_then(|p| p.trim().parse::<u16>().ok());
        let host_port = host_part
            .rsplit(':')
            .next()
            .and_then(|p| p.trim().parse::<u16>().ok());
        if let (Some(container_port), Some(host_port)) = (container_port, host_port) {
            ports.insert(container_port, host_port);
        }
    }
    ports
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn port_mapping_parse() {
        let output = "30080/tcp -> 0.0.0.0:8081\n30443/tcp -> 0.0.0.0:8443\nbogus line";
        let ports = parse_port_lines(output);
        assert_eq!(ports.get(&30080), Some(&8081));
        assert_eq!(ports.get(&30443), Some(&8443));
        assert_eq!(ports.len(), 2);
    }

    #[test]
    fn port_mapping_ipv6() {
        let ports = parse_port_lines("30080/tcp -> [::]:8081");
        assert_eq!(ports.get(&30080), Some(&8081));
    }

    #[test]
    fn system_resources_deserialize() {
        let json = r#"{"MemTotal": 8589934592, "NCPU": 4, "Other": "ignored"}"#;
        let resources: SystemResources = serde_json::from_str(json).unwrap();
        assert_eq!(resources.cpus, 4);
        assert!((resources.memory_gb() - 8.0).abs() < f64::EPSILON);
    }
}
