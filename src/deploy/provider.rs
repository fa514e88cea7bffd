//! Boundary with the provisioning API.
//!
//! Everything the reconciler knows about deployed stacks comes through
//! [`StackProvider`]. The types here are plain data so the provider can be
//! the AWS CLI in production and a scripted stub in tests.

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Resource type of a stack embedded in another stack.
pub const NESTED_STACK_RESOURCE: &str = "AWS::CloudFormation::Stack";

/// Status code the API uses for rejected input, including "no updates".
pub const VALIDATION_ERROR: &str = "ValidationError";

/// Failure reported by a provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The named stack does not exist
    #[error("Stack '{0}' does not exist")]
    StackNotFound(String),

    /// The API answered with a status-coded error
    #[error("{code}: {message}")]
    Rejected {
        /// Status code, e.g. `ValidationError`
        code: String,
        /// Message returned with the code
        message: String,
    },

    /// The call never produced an answer
    #[error("Provider call failed: {0}")]
    Transport(String),

    /// The answer could not be understood
    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the API rejected the request's input rather than failing.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Rejected { code, .. } if code == VALIDATION_ERROR)
    }
}

/// One page of a listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Items on this page
    pub items: Vec<T>,
    /// Cursor for the next page; `None` on the last page
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// Page that ends the listing.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    /// Page followed by the one at `token`.
    pub fn more(items: Vec<T>, token: impl Into<String>) -> Self {
        Self {
            items,
            next_token: Some(token.into()),
        }
    }
}

/// Entry of the stack listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSummary {
    pub name: String,
    pub status: String,
    pub description: Option<String>,
}

/// Live state of one stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedStack {
    pub name: String,
    pub id: String,
    pub status: String,
    pub description: Option<String>,
    /// Parameter values the stack was last deployed with
    pub parameters: BTreeMap<String, String>,
}

/// One resource of a deployed stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackResource {
    pub logical_id: String,
    /// Provider-side id; for a nested stack this is the stack's id
    pub physical_id: Option<String>,
    pub resource_type: String,
    pub status: String,
}

impl StackResource {
    /// Whether this resource is itself a stack.
    pub fn is_nested_stack(&self) -> bool {
        self.resource_type == NESTED_STACK_RESOURCE
    }
}

/// One stack event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackEvent {
    pub stack_name: String,
    pub logical_id: String,
    pub resource_type: String,
    pub status: String,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Create or update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    pub stack_name: String,
    pub template_url: String,
    pub parameters: BTreeMap<String, String>,
    pub capabilities: Vec<String>,
    /// Leave a failed create in place; ignored for updates
    pub disable_rollback: bool,
}

/// Calls the reconciler makes against the provisioning API.
///
/// Stacks are addressed by name or id; the API accepts either.
pub trait StackProvider: Send + Sync {
    /// Region the provider talks to.
    fn region(&self) -> &str;

    /// One page of the stack listing.
    fn list_stacks(
        &self,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<StackSummary>, ProviderError>> + Send;

    /// Live state of `stack`, or [`ProviderError::StackNotFound`].
    fn describe_stack(
        &self,
        stack: &str,
    ) -> impl Future<Output = Result<DeployedStack, ProviderError>> + Send;

    /// Resources of `stack`.
    fn describe_stack_resources(
        &self,
        stack: &str,
    ) -> impl Future<Output = Result<Vec<StackResource>, ProviderError>> + Send;

    /// One page of `stack`'s events.
    fn describe_stack_events(
        &self,
        stack: &str,
        token: Option<String>,
    ) -> impl Future<Output = Result<Page<StackEvent>, ProviderError>> + Send;

    /// Create a stack; returns its id.
    fn create_stack(
        &self,
        request: &StackRequest,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Update a stack; returns its id.
    fn update_stack(
        &self,
        request: &StackRequest,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Template body `stack` was deployed with.
    fn get_template(
        &self,
        stack: &str,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;
}
