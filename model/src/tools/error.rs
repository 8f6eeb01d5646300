use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for external tool invocations (`kind`, `docker`, `helm`, `kubectl`, `flux`).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "'{} {}' failed with exit status '{}'\n\n{}\n\n{}",
        tool,
        args,
        code,
        stdout,
        stderr
    ))]
    CommandFailed {
        tool: String,
        args: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[snafu(display("'{}' not found. Install it and ensure it is on PATH", tool))]
    NotInstalled { tool: String },

    #[snafu(display("Unable to run '{}': {}", tool, source))]
    Spawn {
        tool: String,
        source: std::io::Error,
    },

    #[snafu(display("Unable to parse {} output: {}", tool, source))]
    OutputJson {
        tool: String,
        source: serde_json::Error,
    },

    #[snafu(display("Unable to create directory '{}': {}", path.display(), source))]
    CreateDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("non utf-8 path '{}'", path.display()))]
    NonUtf8Path { path: std::path::PathBuf },
}
