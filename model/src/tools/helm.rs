use super::error::{OutputJsonSnafu, Result};
use super::{run, stdout_string};
use log::{debug, info};
use snafu::ResultExt;
use std::path::Path;

/// A release as reported by `helm list`.
#[derive(Debug, Clone)]
pub struct HelmRelease {
    pub name: String,
    pub namespace: String,
    pub chart: String,
}

/// Wrapper over the `helm` CLI. Release mutations go through here; everything a release
/// creates in the cluster is read back through the typed Kubernetes client.
#[derive(Debug, Clone)]
pub struct Helm {
    kubeconfig: String,
}

impl Helm {
    pub fn new(kubeconfig: &Path) -> Self {
        Self {
            kubeconfig: kubeconfig.display().to_string(),
        }
    }

    fn envs(&self) -> [(&str, &str); 1] {
        [("KUBECONFIG", self.kubeconfig.as_str())]
    }

    pub async fn repo_add(&self, name: &str, url: &str) -> Result<()> {
        run(
            "helm",
            ["repo", "add", name, url, "--force-update"],
            &self.envs(),
        )
        .await?;
        Ok(())
    }

    pub async fn repo_update(&self) -> Result<()> {
        run("helm", ["repo", "update"], &self.envs()).await?;
        Ok(())
    }

    /// `helm upgrade --install` with namespace creation and optional values files.
    pub async fn upgrade_install(
        &self,
        release: &str,
        chart: &str,
        namespace: &str,
        values_files: &[&Path],
        set_values: &[(&str, &str)],
    ) -> Result<()> {
        info!("installing release '{}' from chart '{}'", release, chart);
        let mut args = vec![
            "upgrade".to_string(),
            "--install".to_string(),
            release.to_string(),
            chart.to_string(),
            "--namespace".to_string(),
            namespace.to_string(),
            "--create-namespace".to_string(),
            "--wait".to_string(),
        ];
        for values in values_files {
            args.push("--values".to_string());
            args.push(values.display().to_string());
        }
        for (key, value) in set_values {
            args.push("--set".to_string());
            args.push(format!("{}={}", key, value));
        }
        run("helm", args, &self.envs()).await?;
        Ok(())
    }

    pub async fn uninstall(&self, release: &str, namespace: &str) -> Result<()> {
        info!("uninstalling release '{}' from '{}'", release, namespace);
        run(
            "helm",
            ["uninstall", release, "--namespace", namespace],
            &self.envs(),
        )
        .await?;
        Ok(())
    }

    /// Release names in one namespace.
    pub async fn list(&self, namespace: &str) -> Result<Vec<String>> {
        let output = run(
            "helm",
            ["list", "-q", "--namespace", namespace],
            &self.envs(),
        )
        .await?;
        Ok(stdout_string(&output)
            .lines()
            .map(str::to_string)
            .filter(|line| !line.is_empty())
            .collect())
    }

    /// All releases in the cluster.
    pub async fn list_all(&self) -> Result<Vec<HelmRelease>> {
        let output = run(
            "helm",
            ["list", "-A", "--output", "json"],
            &self.envs(),
        )
        .await?;
        let releases = parse_releases(&stdout_string(&output))?;
        debug!("found {:?}", releases);
        Ok(releases)
    }
}

fn parse_releases(json: &str) -> Result<Vec<HelmRelease>> {
    let raw: Vec<serde_json::Value> =
        serde_json::from_str(json).context(OutputJsonSnafu { tool: "helm" })?;
    Ok(raw
        .iter()
        .filter_map(|entry| {
            Some(HelmRelease {
                name: entry.get("name")?.as_str()?.to_string(),
                namespace: entry.get("namespace")?.as_str()?.to_string(),
                chart: entry.get("chart")?.as_str()?.to_string(),
            })
        })
        .collect())
}

#[cfg(test)]
mod test {
    use super::parse_releases;

    #[test]
    fn release_list_parses() {
        let json = r#"[
            {"name":"vote","namespace":"default","revision":"1","updated":"2024-01-01",
             "status":"deployed","chart":"vote-0.1.0","app_version":"1.0"},
            {"name":"vault","namespace":"hostk8s","revision":"3","updated":"2024-01-02",
             "status":"deployed","chart":"vault-0.28.1","app_version":"1.17.2"}
        ]"#;
        let releases = parse_releases(json).unwrap();
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].name, "vote");
        assert_eq!(releases[1].namespace, "hostk8s");
        assert_eq!(releases[1].chart, "vault-0.28.1");
    }

    #[test]
    fn entries_missing_fields_are_skipped() {
        let json = r#"[{"name":"incomplete"}]"#;
        assert!(parse_releases(json).unwrap().is_empty());
    }

    #[test]
    fn empty_list_parses() {
        assert!(parse_releases("[]").unwrap().is_empty());
    }

    #[test]
    fn garbage_output_is_an_error() {
        assert!(parse_releases("Error: unknown flag").is_err());
    }
}
