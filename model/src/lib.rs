/*!

This library implements hostk8s: a host-mode Kubernetes development environment built on kind.
It provides the typed Kubernetes client operations, the external tool wrappers, and the
GitOps/stack/app/secret workflows that the `hostk8s` CLI exposes.

!*/

#![deny(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::panic,
    clippy::panic_in_result_fn,
    clippy::panicking_unwrap,
    clippy::unwrap_in_result,
    clippy::unwrap_used
)]

pub use config::Settings;
pub use error::{Error, Result};

pub mod addons;
pub mod apps;
pub mod build;
pub mod config;
pub mod constants;
mod error;
pub mod flux;
pub mod manager;
pub mod retry;
pub mod secrets;
pub mod stack;
pub mod status;
pub mod system;
pub mod tools;
