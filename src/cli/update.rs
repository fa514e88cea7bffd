//! Create or update a stack from a rendered template.
//!
//! ```bash
//! brix update region BalancedRegion --ip 5
//! brix --region us-east-1 update api BalancedApi --param Capacity:4 --param Debug
//! ```
//!
//! A stack that does not exist yet is created with rollback disabled and only
//! the given parameters; an existing stack keeps its live parameter values
//! except those given here.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::common::CommandContext;
use crate::deploy::{Operation, Reconciler};

/// Value of a `--param` given without one.
const FLAG_VALUE: &str = "1";

/// Parse `KEY:VALUE`, or `KEY` alone meaning `KEY:1`.
pub fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw.split_once(':').unwrap_or((raw, FLAG_VALUE));
    if key.is_empty() {
        return Err(format!("parameter '{raw}' has no name"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Deploy a template to a stack.
#[derive(Args, Debug)]
pub struct UpdateCommand {
    /// Template name; the `balanced_` prefix may be left out
    template: String,

    /// Stack to create or update
    stack: String,

    /// Deploy what is already uploaded instead of syncing first
    #[arg(long)]
    no_sync: bool,

    /// Second octet of the VPC address range (the `Ip` parameter)
    #[arg(long)]
    ip: Option<String>,

    /// SSH key name (the `KeyName` parameter)
    #[arg(long)]
    key: Option<String>,

    /// Parameter override as KEY:VALUE; KEY alone sets it to 1
    #[arg(long = "param", value_name = "KEY[:VALUE]", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

impl UpdateCommand {
    /// Parameters given on the command line; `--param` wins over `--ip` and
    /// `--key`.
    pub fn overrides(&self) -> BTreeMap<String, String> {
        let mut overrides = BTreeMap::new();
        if let Some(ip) = &self.ip {
            overrides.insert("Ip".to_string(), ip.clone());
        }
        if let Some(key) = &self.key {
            overrides.insert("KeyName".to_string(), key.clone());
        }
        overrides.extend(self.params.iter().cloned());
        overrides
    }

    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let region = ctx.region()?;
        let rendered = ctx.render()?;
        let artifact = rendered.artifact(&self.template)?;

        if self.no_sync {
            info!("skipping sync of {}", artifact.storage_key());
        } else {
            rendered.ensure_valid()?;
            ctx.sync(&rendered).await.context("Failed to sync templates")?;
        }

        let url = rendered.layout.object_url(&region, artifact.storage_key());
        let provider = ctx.provider()?;
        let reconciler = Reconciler::new(&provider, ctx.config.capabilities.clone());
        let (plan, id) = reconciler.deploy(&self.stack, &url, &self.overrides()).await?;

        let verb = match plan.operation {
            Operation::Create => "Creating",
            Operation::Update => "Updating",
        };
        if !ctx.quiet {
            println!("{verb} {} from {} in {region}", self.stack, artifact.name());
            println!("{id}");
        }
        Ok(())
    }
}
