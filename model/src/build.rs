/*!

Image builds for the applications under `src/`. A directory's build file decides the mechanism:
a `docker-bake.hcl` is built and pushed with `docker buildx bake`, a `docker-compose.yml` with
`docker compose build` + `docker compose push`. Either way the images land in the local registry
the build files tag them for.

!*/

use crate::config::Settings;
use crate::tools::{self, Docker, Kind};
use chrono::Utc;
use log::info;
use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::path::{Path, PathBuf};

const SRC_DIR: &str = "src";
const BUILD_VERSION: &str = "1.0.0";

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Cluster is not running. Start it first with 'hostk8s start'"))]
    ClusterNotRunning,

    #[snafu(display(
        "No docker-bake.hcl or docker-compose.yml found in '{}'. Buildable applications: {}",
        path.display(),
        available.join(", ")
    ))]
    NotBuildable {
        path: PathBuf,
        available: Vec<String>,
    },

    #[snafu(display("Unable to {}: {}", action, source))]
    Tool {
        action: String,
        source: tools::Error,
    },
}

/// How an application directory gets built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    Bake,
    Compose,
}

impl BuildKind {
    /// Detect the build type from the directory contents. A bake file wins over a compose file.
    pub fn detect(dir: &Path) -> Option<BuildKind> {
        if dir.join("docker-bake.hcl").is_file() {
            Some(BuildKind::Bake)
        } else if dir.join("docker-compose.yml").is_file() {
            Some(BuildKind::Compose)
        } else {
            None
        }
    }
}

/// Build an application's images and push them to the local registry.
pub async fn build_app(settings: &Settings, app_path: &str) -> Result<()> {
    let exists = Kind
        .cluster_exists(&settings.cluster_name)
        .await
        .context(ToolSnafu {
            action: "check the cluster",
        })?;
    ensure!(exists, ClusterNotRunningSnafu);

    let dir = PathBuf::from(app_path);
    let kind = BuildKind::detect(&dir).context(NotBuildableSnafu {
        path: dir.clone(),
        available: available_builds(),
    })?;

    let build_date = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    let envs = [
        ("BUILD_DATE", build_date.as_str()),
        ("BUILD_VERSION", BUILD_VERSION),
    ];
    info!("building '{}' (version {})", app_path, BUILD_VERSION);

    let docker = Docker;
    match kind {
        BuildKind::Bake => {
            docker
                .buildx_bake_push(&dir, &envs)
                .await
                .context(ToolSnafu {
                    action: format!("bake '{}'", app_path),
                })?;
        }
        BuildKind::Compose => {
            docker.compose_build(&dir, &envs).await.context(ToolSnafu {
                action: format!("build '{}'", app_path),
            })?;
            docker.compose_push(&dir, &envs).await.context(ToolSnafu {
                action: format!("push '{}'", app_path),
            })?;
        }
    }
    info!("build and push of '{}' complete", app_path);
    Ok(())
}

/// Every buildable directory under `src/`, deepest-first directories included.
pub fn available_builds() -> Vec<String> {
    let mut found = Vec::new();
    collect_buildable(Path::new(SRC_DIR), &mut found);
    found.sort();
    found
}

fn collect_buildable(dir: &Path, found: &mut Vec<String>) {
    if BuildKind::detect(dir).is_some() {
        found.push(dir.display().to_string());
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_buildable(&path, found);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn bake_file_wins_over_compose() {
        let dir = TempDir::new().unwrap();
        assert_eq!(BuildKind::detect(dir.path()), None);
        fs::write(dir.path().join("docker-compose.yml"), "services: {}").unwrap();
        assert_eq!(BuildKind::detect(dir.path()), Some(BuildKind::Compose));
        fs::write(dir.path().join("docker-bake.hcl"), "group \"default\" {}").unwrap();
        assert_eq!(BuildKind::detect(dir.path()), Some(BuildKind::Bake));
    }

    #[test]
    fn buildable_directories_are_discovered_recursively() {
        let dir = TempDir::new().unwrap();
        let bake_app = dir.path().join("registry-demo");
        let compose_app = dir.path().join("sample-app").join("vote");
        fs::create_dir_all(&bake_app).unwrap();
        fs::create_dir_all(&compose_app).unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();
        fs::write(bake_app.join("docker-bake.hcl"), "").unwrap();
        fs::write(compose_app.join("docker-compose.yml"), "").unwrap();

        let mut found = Vec::new();
        collect_buildable(dir.path(), &mut found);
        found.sort();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("registry-demo"));
        assert!(found[1].ends_with("vote"));
    }
}
