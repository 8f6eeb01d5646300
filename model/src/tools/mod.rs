/*!

Wrappers over the external command-line tools that own cluster mutations: `kind` for the cluster
itself, `docker` for the registry container, `helm` for chart releases, `kubectl` for manifest and
kustomize application, and `flux` for installing the GitOps controllers. Reads of cluster state
never go through these wrappers; those use the typed Kubernetes client.

!*/

mod docker;
mod error;
mod flux_cli;
mod helm;
mod kind;
mod kubectl;

pub use docker::{Docker, SystemResources};
pub use error::{Error, Result};
pub use flux_cli::FluxCli;
pub use helm::{Helm, HelmRelease};
pub use kind::Kind;
pub use kubectl::Kubectl;

use error::{CommandFailedSnafu, NotInstalledSnafu, SpawnSnafu};
use snafu::ResultExt;
use std::ffi::OsStr;
use std::process::Output;
use tokio::process::Command;

/// Returns true when `tool` resolves to an executable on the `PATH`.
pub fn is_installed(tool: &str) -> bool {
    let path = match std::env::var_os("PATH") {
        Some(path) => path,
        None => return false,
    };
    std::env::split_paths(&path).any(|dir| {
        let candidate = dir.join(tool);
        candidate.is_file() || candidate.with_extension("exe").is_file()
    })
}

/// Run a tool to completion, capturing output. A missing binary becomes `Error::NotInstalled`,
/// a non-zero exit becomes `Error::CommandFailed` carrying stdout and stderr.
pub(crate) async fn run<I, S>(tool: &str, args: I, envs: &[(&str, &str)]) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(tool);
    command.args(args);
    for (key, value) in envs {
        command.env(key, value);
    }
    finish(tool, command).await
}

/// Like `run`, but executed from `dir`. Image builds resolve their contexts relative to the
/// application directory.
pub(crate) async fn run_in_dir<I, S>(
    tool: &str,
    args: I,
    envs: &[(&str, &str)],
    dir: &std::path::Path,
) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(tool);
    command.args(args).current_dir(dir);
    for (key, value) in envs {
        command.env(key, value);
    }
    finish(tool, command).await
}

async fn finish(tool: &str, mut command: Command) -> Result<Output> {
    let output = match command.output().await {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return NotInstalledSnafu { tool }.fail()
        }
        Err(e) => return Err(e).context(SpawnSnafu { tool }),
    };
    if !output.status.success() {
        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        return CommandFailedSnafu {
            tool,
            args: args.join(" "),
            code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
        .fail();
    }
    Ok(output)
}

/// Like `run`, but feeds `stdin` to the child process. Used for `kubectl apply -f -`.
pub(crate) async fn run_with_stdin<I, S>(
    tool: &str,
    args: I,
    envs: &[(&str, &str)],
    stdin: &str,
) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    use std::process::Stdio;
    use tokio::io::AsyncWriteExt;

    let mut command = Command::new(tool);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in envs {
        command.env(key, value);
    }
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return NotInstalledSnafu { tool }.fail()
        }
        Err(e) => return Err(e).context(SpawnSnafu { tool }),
    };
    if let Some(mut handle) = child.stdin.take() {
        handle
            .write_all(stdin.as_bytes())
            .await
            .context(SpawnSnafu { tool })?;
    }
    let output = child.wait_with_output().await.context(SpawnSnafu { tool })?;
    if !output.status.success() {
        return CommandFailedSnafu {
            tool,
            args: "<stdin>".to_string(),
            code: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
        .fail();
    }
    Ok(output)
}

pub(crate) fn stdout_string(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
