/*!

Typed access to the Flux custom resources. The `GitRepository` and `Kustomization` CRDs are
declared here with the same derive the rest of the Kubernetes objects use, so GitOps state can be
read and patched through the typed client instead of shelling out to the flux CLI.

!*/

mod crd;
mod error;
mod ops;

pub use crd::{
    ready_condition, Artifact, Condition, DependencyRef, GitRepository, GitRepositoryRef,
    GitRepositorySpec, GitRepositoryStatus, Kustomization, KustomizationSpec, KustomizationStatus,
    SourceRef,
};
pub use error::{Error, Result};
pub use ops::FluxClient;
pub(crate) use ops::stack_short_name;
