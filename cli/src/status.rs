use anyhow::{Context, Result};
use clap::Parser;
use model::manager::ClusterManager;
use model::status;
use model::Settings;
use terminal_size::{Height, Width};

/// Show the status of the cluster, addons, GitOps state and deployed apps.
#[derive(Debug, Parser)]
pub(crate) struct Status {
    /// Output the full status in JSON format.
    #[clap(long = "json")]
    json: bool,
}

impl Status {
    pub(crate) async fn run(self, settings: &Settings, manager: ClusterManager) -> Result<()> {
        let snapshot = status::collect(&manager, settings)
            .await
            .context("Unable to collect cluster status")?;

        if self.json {
            println!(
                "{}",
                status::render_json(&snapshot).context("Could not create string from status.")?
            );
        } else {
            let (terminal_size::Width(width), _) =
                terminal_size::terminal_size().unwrap_or((Width(120), Height(0)));
            println!("{}", status::render_text(&snapshot, width as usize));
        }
        Ok(())
    }
}
