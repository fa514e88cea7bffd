//! Upload rendered templates to every region's bucket.

use anyhow::{Context, Result};
use clap::Args;

use super::common::CommandContext;

/// Validate, then upload every template to every configured region.
#[derive(Args, Debug, Default)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let rendered = ctx.render()?;
        rendered.ensure_valid()?;
        let written = ctx.sync(&rendered).await.context("Failed to sync templates")?;
        if !ctx.quiet {
            println!(
                "Synced {} templates to {} regions ({written} objects)",
                rendered.report.artifacts().len(),
                ctx.config.regions.len()
            );
        }
        Ok(())
    }
}
