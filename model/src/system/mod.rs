/// Definitions of the K8S objects the cluster manager creates directly.
mod namespace;
mod registry;

pub use namespace::{hostk8s_namespace, labeled_namespace};
pub use registry::local_registry_hosting_config_map;
