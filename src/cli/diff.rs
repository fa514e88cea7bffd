//! Show how a deployed stack's template differs from the local render.

use anyhow::Result;
use clap::Args;

use super::common::CommandContext;
use crate::deploy::Reconciler;

/// Diff a stack's deployed template against a local template.
#[derive(Args, Debug)]
pub struct DiffCommand {
    /// Template name; the `balanced_` prefix may be left out
    template: String,

    /// Deployed stack to compare with
    stack: String,
}

impl DiffCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let rendered = ctx.render()?;
        let artifact = rendered.artifact(&self.template)?;
        let provider = ctx.provider()?;
        let reconciler = Reconciler::new(&provider, Vec::new());

        match reconciler.diff(&self.stack, artifact.body(), artifact.name()).await? {
            Some(patch) => print!("{patch}"),
            None if !ctx.quiet => println!("{} matches {}", self.stack, artifact.name()),
            None => {}
        }
        Ok(())
    }
}
