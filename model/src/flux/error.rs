use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for Flux resource operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
pub enum Error {
    #[snafu(display("Unable to {}: {}", action, source))]
    Kube { action: String, source: kube::Error },

    #[snafu(display("Flux is not installed in this cluster. Deploy a stack first with 'hostk8s up'"))]
    FluxNotInstalled,

    #[snafu(display("Failed to sync {}", failed.join(", ")))]
    SyncFailed { failed: Vec<String> },

    #[snafu(display("Failed to {} {}", action, failed.join(", ")))]
    SuspendFailed {
        action: String,
        failed: Vec<String>,
    },
}
