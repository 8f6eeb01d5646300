use crate::error::{self, Result};
use snafu::ResultExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const DEFAULT_CLUSTER_NAME: &str = "hostk8s";
const DEFAULT_K8S_VERSION: &str = "v1.34.0";
const DEFAULT_KUBECONFIG_PATH: &str = "data/kubeconfig/config";
const DEFAULT_REGISTRY_PORT: u16 = 5002;
const DEFAULT_VAULT_ADDR: &str = "http://localhost:8080";
const DEFAULT_VAULT_TOKEN: &str = "hostk8s";
const DEFAULT_GITOPS_REPO: &str = "https://community.opengroup.org/danielscholl/hostk8s";
const DEFAULT_GITOPS_BRANCH: &str = "main";

/// `Settings` is the explicit configuration for every hostk8s operation. The original tooling
/// relied on ambient process environment sourced from a `.env` file; here the same variables are
/// resolved once, into one value that is passed around.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cluster_name: String,
    pub k8s_version: String,
    pub kubeconfig_path: PathBuf,
    /// Name of the kind config to use (`kind-<name>.yaml`), if any.
    pub kind_config: Option<String>,
    pub metallb_enabled: bool,
    pub ingress_enabled: bool,
    pub registry_enabled: bool,
    pub metrics_disabled: bool,
    pub vault_enabled: bool,
    pub flux_enabled: bool,
    pub registry_port: u16,
    pub vault_addr: String,
    pub vault_token: String,
    pub gitops_repo: String,
    pub gitops_branch: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_vars(&HashMap::new())
    }
}

impl Settings {
    /// Load settings from `.env` in the current directory (when present) overlaid with the real
    /// process environment. Real environment variables win, preserving values exported by `make`.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(".env"))
    }

    pub fn load_from(env_file: &Path) -> Result<Self> {
        let mut vars = if env_file.exists() {
            let contents = std::fs::read_to_string(env_file).context(error::FileReadSnafu {
                path: env_file.to_path_buf(),
            })?;
            parse_env_file(&contents)
        } else {
            HashMap::new()
        };
        for (key, value) in std::env::vars() {
            vars.insert(key, value);
        }
        Ok(Self::from_vars(&vars))
    }

    /// Build settings from an already-resolved variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string());
        Self {
            cluster_name: get("CLUSTER_NAME").unwrap_or_else(|| DEFAULT_CLUSTER_NAME.to_string()),
            k8s_version: get("K8S_VERSION").unwrap_or_else(|| DEFAULT_K8S_VERSION.to_string()),
            kubeconfig_path: get("KUBECONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_KUBECONFIG_PATH)),
            kind_config: get("KIND_CONFIG").filter(|v| !v.is_empty()),
            metallb_enabled: flag(vars, "METALLB_ENABLED") || flag(vars, "ENABLE_METALLB"),
            // Ingress is on by default; INGRESS_DISABLED turns it off.
            ingress_enabled: !flag(vars, "INGRESS_DISABLED"),
            registry_enabled: flag(vars, "REGISTRY_ENABLED") || flag(vars, "ENABLE_REGISTRY"),
            metrics_disabled: flag(vars, "METRICS_DISABLED"),
            vault_enabled: flag(vars, "VAULT_ENABLED") || flag(vars, "ENABLE_VAULT"),
            flux_enabled: flag(vars, "FLUX_ENABLED") || flag(vars, "ENABLE_FLUX"),
            registry_port: get("REGISTRY_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REGISTRY_PORT),
            vault_addr: get("VAULT_ADDR").unwrap_or_else(|| DEFAULT_VAULT_ADDR.to_string()),
            vault_token: get("VAULT_TOKEN").unwrap_or_else(|| DEFAULT_VAULT_TOKEN.to_string()),
            gitops_repo: get("GITOPS_REPO").unwrap_or_else(|| DEFAULT_GITOPS_REPO.to_string()),
            gitops_branch: get("GITOPS_BRANCH")
                .unwrap_or_else(|| DEFAULT_GITOPS_BRANCH.to_string()),
        }
    }

    /// The kind context name written into the kubeconfig.
    pub fn kube_context(&self) -> String {
        format!("kind-{}", self.cluster_name)
    }

    /// Resolve the path of the kubeconfig, honoring an explicit `KUBECONFIG` environment
    /// variable. Errors when the resolved file does not exist.
    pub fn detect_kubeconfig(&self) -> Result<PathBuf> {
        if let Ok(path) = std::env::var("KUBECONFIG") {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        if self.kubeconfig_path.exists() {
            return Ok(self.kubeconfig_path.clone());
        }
        error::KubeconfigMissingSnafu {
            path: self.kubeconfig_path.clone(),
        }
        .fail()
    }
}

fn flag(vars: &HashMap<String, String>, key: &str) -> bool {
    vars.get(key)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Parse the contents of a `.env` file. Comment and blank lines are skipped, inline `#` comments
/// are stripped, and surrounding single or double quotes are removed from values. Malformed lines
/// (no `=`) are ignored.
pub fn parse_env_file(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || !line.contains('=') {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        let value = match value.split_once('#') {
            Some((before, _)) => before,
            None => value,
        };
        let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
        vars.insert(key.trim().to_string(), value.to_string());
    }
    vars
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn env_file_parsing() {
        let contents = r#"
# cluster configuration
CLUSTER_NAME=my-cluster
K8S_VERSION = v1.30.0   # pinned for CI
QUOTED="hello world"
SINGLE='quoted'
MALFORMED LINE
EMPTY=
"#;
        let vars = parse_env_file(contents);
        assert_eq!(vars.get("CLUSTER_NAME").unwrap(), "my-cluster");
        assert_eq!(vars.get("K8S_VERSION").unwrap(), "v1.30.0");
        assert_eq!(vars.get("QUOTED").unwrap(), "hello world");
        assert_eq!(vars.get("SINGLE").unwrap(), "quoted");
        assert_eq!(vars.get("EMPTY").unwrap(), "");
        assert!(!vars.contains_key("MALFORMED LINE"));
    }

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.cluster_name, "hostk8s");
        assert_eq!(settings.kube_context(), "kind-hostk8s");
        assert!(settings.ingress_enabled);
        assert!(!settings.metallb_enabled);
        assert!(!settings.flux_enabled);
        assert_eq!(settings.registry_port, 5002);
        assert_eq!(settings.vault_token, "hostk8s");
    }

    #[test]
    fn flag_spellings_and_whitespace() {
        let mut vars = HashMap::new();
        vars.insert("ENABLE_METALLB".to_string(), " True ".to_string());
        vars.insert("INGRESS_DISABLED".to_string(), "true".to_string());
        vars.insert("FLUX_ENABLED".to_string(), "TRUE".to_string());
        let settings = Settings::from_vars(&vars);
        assert!(settings.metallb_enabled);
        assert!(!settings.ingress_enabled);
        assert!(settings.flux_enabled);
    }
}
