//! Reconciling rendered artifacts with deployed stacks.
//!
//! The [`Reconciler`] is the only part of brix that talks to live
//! infrastructure, and only through a [`StackProvider`]. It decides between
//! creating and updating a stack, lists live stacks, aggregates nested stack
//! events and diffs deployed templates against local renders. Calls are made
//! one at a time.
//!
//! # Module Structure
//!
//! - [`provider`] - provider trait and the data it exchanges
//! - [`pagination`] - cursor listings as streams
//! - [`events`] - recursive event collection
//! - [`diff`] - canonical template diff
//! - [`store`] - artifact uploads
//! - [`aws_cli`] - provider and store backed by the AWS CLI

pub mod aws_cli;
pub mod diff;
pub mod events;
pub mod pagination;
pub mod provider;
pub mod store;

use std::collections::BTreeMap;

use futures::TryStreamExt;
use tracing::{debug, info};

pub use aws_cli::{AwsCliProvider, S3CliStore};
pub use diff::{DiffError, diff_templates};
pub use events::{EventLog, collect_events};
pub use pagination::paginate;
pub use provider::{
    DeployedStack, Page, ProviderError, StackEvent, StackProvider, StackRequest, StackResource,
    StackSummary,
};
pub use store::{ArtifactStore, sync_artifacts};

/// Status of stacks that are gone but still listed.
pub const DELETED_STATUS: &str = "DELETE_COMPLETE";

/// What a deploy will do to the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}

/// A create or update request, decided but not yet sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub operation: Operation,
    pub request: StackRequest,
}

/// Drives one region's stacks through a provider.
#[derive(Debug)]
pub struct Reconciler<'a, P> {
    provider: &'a P,
    capabilities: Vec<String>,
}

impl<'a, P: StackProvider> Reconciler<'a, P> {
    /// Reconciler acknowledging `capabilities` on every create and update.
    pub fn new(provider: &'a P, capabilities: Vec<String>) -> Self {
        Self {
            provider,
            capabilities,
        }
    }

    /// Decide how to bring `stack` to the template at `template_url`.
    ///
    /// A missing stack is created with exactly `overrides` as parameters and
    /// rollback disabled. An existing stack is updated with its live
    /// parameter values, overlaid with `overrides`. Any other lookup failure
    /// is returned as is.
    pub async fn plan(
        &self,
        stack: &str,
        template_url: &str,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Plan, ProviderError> {
        let (operation, parameters, disable_rollback) =
            match self.provider.describe_stack(stack).await {
                Ok(live) => {
                    let mut parameters = live.parameters;
                    parameters.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
                    (Operation::Update, parameters, false)
                }
                Err(ProviderError::StackNotFound(_)) => (Operation::Create, overrides.clone(), true),
                Err(err) => return Err(err),
            };
        debug!(target: "deploy", "{stack}: {operation:?} with {} parameters", parameters.len());

        Ok(Plan {
            operation,
            request: StackRequest {
                stack_name: stack.to_string(),
                template_url: template_url.to_string(),
                parameters,
                capabilities: self.capabilities.clone(),
                disable_rollback,
            },
        })
    }

    /// Plan and send a create or update. Returns the plan that was sent and
    /// the stack id.
    pub async fn deploy(
        &self,
        stack: &str,
        template_url: &str,
        overrides: &BTreeMap<String, String>,
    ) -> Result<(Plan, String), ProviderError> {
        let plan = self.plan(stack, template_url, overrides).await?;
        let id = match plan.operation {
            Operation::Create => self.provider.create_stack(&plan.request).await?,
            Operation::Update => self.provider.update_stack(&plan.request).await?,
        };
        info!("{:?} of {stack} in {} started", plan.operation, self.provider.region());
        Ok((plan, id))
    }

    /// Every stack in the region except deleted ones, across all pages.
    pub async fn live_stacks(&self) -> Result<Vec<StackSummary>, ProviderError> {
        let provider = self.provider;
        paginate(move |token| provider.list_stacks(token))
            .try_filter(|summary| std::future::ready(summary.status != DELETED_STATUS))
            .try_collect()
            .await
    }

    /// Events of `stack`, and of its nested stacks with `recurse`.
    pub async fn events(&self, stack: &str, recurse: bool) -> Result<EventLog, ProviderError> {
        collect_events(self.provider, stack, recurse).await
    }

    /// Diff between `stack`'s deployed template and `local`.
    pub async fn diff(
        &self,
        stack: &str,
        local: &str,
        local_label: &str,
    ) -> Result<Option<String>, DiffError> {
        let deployed = self.provider.get_template(stack).await?;
        diff_templates(&deployed, local, stack, local_label)
    }
}
