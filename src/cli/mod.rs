//! Command-line interface for brix.
//!
//! ```text
//! brix [--verbose|--quiet] [--config PATH] [--region REGION] <command>
//!
//!   validate                      render every template, report failures
//!   templates [--tree]            list templates and their storage keys
//!   show <name>                   print one template's canonical JSON
//!   sync                          upload every template to every region
//!   update <template> <stack>     create or update a stack
//!   diff <template> <stack>       diff deployed against local
//!   list                          list live stacks
//!   events [<stack>]              show stack events, nested stacks included
//! ```
//!
//! Every command loads the configuration first (see [`crate::config`]).
//! Failures propagate as `anyhow::Error` to `main`, which reports them
//! through [`crate::core::user_friendly_error`] and exits with status 1.

pub mod common;
mod diff;
mod events;
mod list;
mod sync;
mod templates;
mod update;
pub mod validate;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use common::CommandContext;

use crate::config::BrixConfig;

#[derive(Parser, Debug)]
#[command(
    name = "brix",
    about = "Render composable CloudFormation templates and reconcile them against deployed stacks",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log debug output to stderr
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file [default: $BRIX_CONFIG or ./brix.toml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Region to act on [default: from configuration]
    #[arg(short, long, global = true)]
    region: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render every template and report failures
    Validate(validate::ValidateCommand),

    /// List templates with their storage keys
    Templates(templates::TemplatesCommand),

    /// Print a template's canonical JSON
    Show(templates::ShowCommand),

    /// Upload every template to every configured region
    Sync(sync::SyncCommand),

    /// Create or update a stack from a template
    Update(update::UpdateCommand),

    /// Diff a deployed stack against a local template
    Diff(diff::DiffCommand),

    /// List live stacks in the region
    List(list::ListCommand),

    /// Show stack events
    Events(events::EventsCommand),
}

impl Cli {
    /// Log filter: `RUST_LOG` when set, else from `--verbose`/`--quiet`.
    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = if self.verbose {
                "debug"
            } else if self.quiet {
                "error"
            } else {
                "warn"
            };
            EnvFilter::new(level)
        })
    }

    fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.log_filter())
            .with_writer(std::io::stderr)
            .with_target(self.verbose)
            .try_init();
    }

    pub async fn execute(self) -> Result<()> {
        self.init_logging();
        let config = BrixConfig::load(self.config.clone()).await?;
        let ctx = CommandContext::new(config, self.region.clone(), self.quiet);

        match self.command {
            Commands::Validate(cmd) => cmd.execute(&ctx).await,
            Commands::Templates(cmd) => cmd.execute(&ctx).await,
            Commands::Show(cmd) => cmd.execute(&ctx).await,
            Commands::Sync(cmd) => cmd.execute(&ctx).await,
            Commands::Update(cmd) => cmd.execute(&ctx).await,
            Commands::Diff(cmd) => cmd.execute(&ctx).await,
            Commands::List(cmd) => cmd.execute(&ctx).await,
            Commands::Events(cmd) => cmd.execute(&ctx).await,
        }
    }
}
