//! Inspect the catalogue: list templates or print one rendered template.

use anyhow::Result;
use clap::Args;

use super::common::CommandContext;

/// List catalogue templates with their storage keys.
#[derive(Args, Debug, Default)]
pub struct TemplatesCommand {
    /// Print the nesting tree under each top-level template instead
    #[arg(long)]
    tree: bool,
}

impl TemplatesCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let rendered = ctx.render()?;
        if self.tree {
            let graph = rendered.catalog.graph();
            let embedded: Vec<String> =
                rendered.catalog.names().flat_map(|name| graph.direct_deps(name)).collect();
            for name in rendered.catalog.names().filter(|n| !embedded.iter().any(|e| e == n)) {
                print!("{}", graph.to_tree_string(name));
            }
            return Ok(());
        }

        for (name, outcome) in rendered.report.entries() {
            match outcome {
                Ok(artifact) => println!("{name}\t{}", artifact.storage_key()),
                Err(err) => println!("{name}\t(not rendered: {err})"),
            }
        }
        Ok(())
    }
}

/// Print a template's canonical JSON.
#[derive(Args, Debug)]
pub struct ShowCommand {
    /// Template name; the `balanced_` prefix may be left out
    name: String,
}

impl ShowCommand {
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let rendered = ctx.render()?;
        let artifact = rendered.artifact(&self.name)?;
        println!("{}", artifact.body());
        Ok(())
    }
}
