//! Show a stack's event history, including its nested stacks.

use anyhow::Result;
use clap::Args;

use super::common::CommandContext;
use crate::constants::DEFAULT_EVENTS_STACK;
use crate::deploy::Reconciler;

/// Print events oldest first.
#[derive(Args, Debug)]
pub struct EventsCommand {
    /// Stack name or id
    #[arg(default_value = DEFAULT_EVENTS_STACK)]
    stack: String,

    /// Only the stack itself, not the stacks nested in it
    #[arg(long)]
    no_recurse: bool,
}

impl EventsCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let provider = ctx.provider()?;
        let reconciler = Reconciler::new(&provider, Vec::new());
        let log = reconciler.events(&self.stack, !self.no_recurse).await?;
        for line in log.lines() {
            println!("{line}");
        }
        Ok(())
    }
}
