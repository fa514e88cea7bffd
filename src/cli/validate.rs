//! Render every template and report each one's outcome.
//!
//! ```bash
//! brix validate
//! brix --quiet validate   # only failures
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::common::{CommandContext, Rendered};

/// Render the whole catalogue and report failures.
#[derive(Args, Debug, Default)]
pub struct ValidateCommand {}

impl ValidateCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let rendered = ctx.render()?;
        for line in report_lines(&rendered, ctx.quiet) {
            println!("{line}");
        }
        rendered.ensure_valid()?;
        Ok(())
    }
}

/// `<name> ok` per rendered template, unless `quiet`, and
/// `<name> error: <reason>` per failure.
pub fn report_lines(rendered: &Rendered, quiet: bool) -> Vec<String> {
    rendered
        .report
        .entries()
        .filter_map(|(name, outcome)| match outcome {
            Ok(_) if quiet => None,
            Ok(_) => Some(format!("{name} {}", "ok".green())),
            Err(err) => Some(format!("{name} {}: {err}", "error".red())),
        })
        .collect()
}
