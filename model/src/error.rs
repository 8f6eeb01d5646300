use snafu::Snafu;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for configuration and other repo-local concerns.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Unable to read '{}': {}", path.display(), source))]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display(
        "No kubeconfig found at '{}'. Ensure the cluster is running ('hostk8s start')",
        path.display()
    ))]
    KubeconfigMissing { path: PathBuf },
}
