/*!

Provides utilities for testing hostk8s against a real `kind` cluster. We call this testing
modality `selftest` to distinguish it from the clusters hostk8s manages for its users.

!*/

pub mod cluster;

pub use cluster::Cluster;
