//! List the stacks deployed in a region.

use anyhow::Result;
use clap::Args;

use super::common::CommandContext;
use crate::deploy::{Reconciler, StackSummary};

/// List live stacks as `<name>: <description>`.
#[derive(Args, Debug, Default)]
pub struct ListCommand {}

impl ListCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let provider = ctx.provider()?;
        let reconciler = Reconciler::new(&provider, Vec::new());
        for stack in reconciler.live_stacks().await? {
            println!("{}", stack_line(&stack));
        }
        Ok(())
    }
}

fn stack_line(stack: &StackSummary) -> String {
    format!("{}: {}", stack.name, stack.description.as_deref().unwrap_or_default())
}
