use anyhow::{Context, Result};
use clap::Parser;
use model::build;
use model::Settings;

/// Build an application's images from src/ and push them to the local registry. A
/// `docker-bake.hcl` in the directory is preferred over a `docker-compose.yml`.
#[derive(Debug, Parser)]
pub(crate) struct Build {
    /// Path to the application directory (e.g. src/registry-demo).
    app_path: Option<String>,

    /// List the buildable applications under src/ instead of building.
    #[clap(long, short)]
    list: bool,
}

impl Build {
    pub(crate) async fn run(self, settings: &Settings) -> Result<()> {
        if self.list {
            let builds = build::available_builds();
            if builds.is_empty() {
                println!("No buildable applications found in src/.");
            } else {
                println!("Buildable applications:");
                for path in builds {
                    println!("  {}", path);
                }
            }
            return Ok(());
        }

        let app_path = self
            .app_path
            .context("An application path is required (e.g. src/registry-demo)")?;
        build::build_app(settings, &app_path)
            .await
            .context(format!("Unable to build '{}'", app_path))?;
        println!("Built and pushed '{}'.", app_path);
        Ok(())
    }
}
