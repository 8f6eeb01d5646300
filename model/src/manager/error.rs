use snafu::Snafu;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for `ClusterManager`
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum Error {
    #[snafu(display("Unable to create client: {}", source))]
    ClientCreateKubeconfig {
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("Cluster '{}' already exists, run 'stop' first", cluster_name))]
    ClusterExists { cluster_name: String },

    #[snafu(display("Unable to read kubeconfig: {}", source))]
    ConfigRead {
        source: kube::config::KubeconfigError,
    },

    #[snafu(display("Error creating {}: {}", what, source))]
    Create { what: String, source: kube::Error },

    #[snafu(display("Unable to {}: {}", action, source))]
    Io {
        action: String,
        source: std::io::Error,
    },

    #[snafu(display("Unable to {}: {}", action, source))]
    Kube { action: String, source: kube::Error },

    #[snafu(display("Kind config file '{}' not found", path.display()))]
    KindConfigMissing { path: PathBuf },

    #[snafu(display("Required tool '{}' is not installed. Install it and ensure it is on PATH", tool))]
    MissingTool { tool: String },

    #[snafu(display("Docker is not running, start it and retry"))]
    DockerNotRunning,

    #[snafu(display("Cluster nodes were not ready within {} seconds", seconds))]
    NodesNotReady { seconds: u64 },

    #[snafu(display("Namespace '{}' did not become visible", namespace))]
    NamespaceNotVisible { namespace: String },

    #[snafu(display("{}: {}", context, source))]
    Tool {
        context: String,
        source: crate::tools::Error,
    },
}
