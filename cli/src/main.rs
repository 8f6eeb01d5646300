/*!

This is the command line interface for hostk8s: a host-mode Kubernetes development environment
built on kind, Flux and a handful of local addons.

!*/

mod build;
mod deploy;
mod down;
mod remove;
mod restart;
mod resume;
mod secrets;
mod start;
mod status;
mod stop;
mod suspend;
mod sync;
mod up;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use model::manager::ClusterManager;
use model::Settings;
use std::path::PathBuf;

/// The command line interface for managing a local hostk8s development cluster.
#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Args {
    /// Set logging verbosity [trace|debug|info|warn|error]. If the environment variable `RUST_LOG`
    /// is present, it overrides the default logging behavior. See https://docs.rs/env_logger/latest
    #[clap(long = "log-level", default_value = "info")]
    log_level: LevelFilter,
    /// Path to the kubeconfig file. Also can be passed with the KUBECONFIG environment variable.
    #[clap(long = "kubeconfig")]
    kubeconfig: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// Create the kind cluster and install the enabled addons.
    Start(start::Start),
    /// Delete the kind cluster and its local registry.
    Stop(stop::Stop),
    /// Delete the cluster, then create it again.
    Restart(restart::Restart),
    /// Show the status of the cluster, its addons, GitOps state and deployed apps.
    Status(status::Status),
    /// Build application images from src/ and push them to the local registry.
    Build(build::Build),
    /// Trigger Flux reconciliation of sources and kustomizations.
    Sync(sync::Sync),
    /// Suspend GitOps reconciliation of every source.
    Suspend(suspend::Suspend),
    /// Resume GitOps reconciliation of every source.
    Resume(resume::Resume),
    /// Deploy an app from software/apps.
    Deploy(deploy::Deploy),
    /// Remove a deployed app.
    Remove(remove::Remove),
    /// Deploy a software stack through Flux.
    Up(up::Up),
    /// Remove a software stack and its GitOps objects.
    Down(down::Down),
    /// Manage Vault secrets declared by a stack's secret contract.
    Secrets(secrets::Secrets),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logger(args.log_level);
    if let Err(e) = run(args).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = Settings::load().context("Unable to load configuration")?;
    match args.command {
        Command::Start(start) => start.run(&settings).await,
        Command::Stop(stop) => stop.run(&settings).await,
        Command::Restart(restart) => restart.run(&settings).await,
        Command::Status(status) => {
            let manager = cluster_manager(&settings, &args.kubeconfig).await?;
            status.run(&settings, manager).await
        }
        Command::Build(build) => build.run(&settings).await,
        Command::Sync(sync) => {
            let manager = cluster_manager(&settings, &args.kubeconfig).await?;
            sync.run(manager).await
        }
        Command::Suspend(suspend) => {
            let manager = cluster_manager(&settings, &args.kubeconfig).await?;
            suspend.run(manager).await
        }
        Command::Resume(resume) => {
            let manager = cluster_manager(&settings, &args.kubeconfig).await?;
            resume.run(manager).await
        }
        Command::Deploy(deploy) => {
            let manager = cluster_manager(&settings, &args.kubeconfig).await?;
            deploy.run(&settings, manager).await
        }
        Command::Remove(remove) => {
            let manager = cluster_manager(&settings, &args.kubeconfig).await?;
            remove.run(&settings, manager).await
        }
        Command::Up(up) => {
            let manager = cluster_manager(&settings, &args.kubeconfig).await?;
            up.run(&settings, manager).await
        }
        Command::Down(down) => {
            let manager = cluster_manager(&settings, &args.kubeconfig).await?;
            down.run(&settings, manager).await
        }
        Command::Secrets(secrets) => secrets.run(&settings).await,
    }
}

/// Build the typed client from `--kubeconfig` when given, otherwise from the cluster's own
/// kubeconfig file.
async fn cluster_manager(
    settings: &Settings,
    kubeconfig: &Option<PathBuf>,
) -> Result<ClusterManager> {
    let path = match kubeconfig {
        Some(path) => path.clone(),
        None => settings
            .detect_kubeconfig()
            .context("Unable to locate a kubeconfig")?,
    };
    ClusterManager::new_from_kubeconfig_path(&path)
        .await
        .context(format!(
            "Unable to create hostk8s client from path '{}'",
            path.display()
        ))
}

/// Initialize the logger with the value passed by `--log-level` (or its default) when the
/// `RUST_LOG` environment variable is not present. If present, the `RUST_LOG` environment variable
/// overrides `--log-level`/`level`.
fn init_logger(level: LevelFilter) {
    match std::env::var(env_logger::DEFAULT_FILTER_ENV).ok() {
        Some(_) => {
            // RUST_LOG exists; env_logger will use it.
            Builder::from_default_env().init();
        }
        None => {
            // RUST_LOG does not exist; use default log level for this crate only.
            Builder::new()
                .filter(Some(env!("CARGO_CRATE_NAME")), level)
                .filter(Some("hostk8s_model"), level)
                .init();
        }
    }
}
