//! Test utilities for brix
//!
//! Scripted stand-ins for the provisioning API and the artifact store, plus
//! once-only log setup. Both stand-ins record what they were asked so tests
//! can assert on the exact sequence of calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use brix::deploy::Reconciler;
//! use brix::test_utils::StubProvider;
//! use std::collections::BTreeMap;
//!
//! # async fn example() {
//! let provider = StubProvider::new("us-west-1");
//! provider.add_stack("BalancedApi", BTreeMap::new());
//! let reconciler = Reconciler::new(&provider, Vec::new());
//! let plan = reconciler.plan("BalancedApi", "https://example", &BTreeMap::new()).await;
//! assert!(plan.is_ok());
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, Once, PoisonError};

use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::deploy::{
    ArtifactStore, DeployedStack, Page, ProviderError, StackEvent, StackProvider, StackRequest,
    StackResource, StackSummary,
};

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, else `RUST_LOG`; with neither, tests stay quiet.
///
/// ```bash
/// RUST_LOG=aws=debug,deploy=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn page_after<T: Clone>(pages: &[Page<T>], token: Option<&str>) -> Result<Page<T>, ProviderError> {
    let index = match token {
        None => 0,
        Some(token) => {
            let previous = pages
                .iter()
                .position(|page| page.next_token.as_deref() == Some(token))
                .ok_or_else(|| ProviderError::InvalidResponse(format!("unknown cursor {token}")))?;
            previous + 1
        }
    };
    Ok(pages.get(index).cloned().unwrap_or_else(|| Page::last(Vec::new())))
}

#[derive(Debug, Default)]
struct StubState {
    stacks: BTreeMap<String, DeployedStack>,
    resources: HashMap<String, Vec<StackResource>>,
    events: HashMap<String, Vec<Page<StackEvent>>>,
    summaries: Vec<Page<StackSummary>>,
    templates: HashMap<String, String>,
    failures: HashMap<String, ProviderError>,
    calls: Vec<String>,
    requests: Vec<(String, StackRequest)>,
}

/// In-memory [`StackProvider`] answering from scripted state.
///
/// Unknown stacks have no resources and no events; describing one is
/// [`ProviderError::StackNotFound`]. A failure registered with
/// [`fail`](Self::fail) is returned by every later call of that operation.
#[derive(Debug)]
pub struct StubProvider {
    region: String,
    state: Mutex<StubState>,
}

impl StubProvider {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            state: Mutex::new(StubState::default()),
        }
    }

    /// A live stack with `parameters`.
    pub fn add_stack(&self, name: &str, parameters: BTreeMap<String, String>) {
        let stack = DeployedStack {
            name: name.to_string(),
            id: self.stack_id(name),
            status: "CREATE_COMPLETE".to_string(),
            description: None,
            parameters,
        };
        lock(&self.state).stacks.insert(name.to_string(), stack);
    }

    pub fn add_resource(
        &self,
        stack: &str,
        logical_id: &str,
        resource_type: &str,
        physical_id: Option<&str>,
    ) {
        lock(&self.state).resources.entry(stack.to_string()).or_default().push(StackResource {
            logical_id: logical_id.to_string(),
            physical_id: physical_id.map(str::to_string),
            resource_type: resource_type.to_string(),
            status: "CREATE_COMPLETE".to_string(),
        });
    }

    /// Event pages of `stack`, chained through their cursors.
    pub fn add_event_pages(&self, stack: &str, pages: Vec<Page<StackEvent>>) {
        lock(&self.state).events.insert(stack.to_string(), pages);
    }

    /// Pages of the stack listing, chained through their cursors.
    pub fn add_summary_pages(&self, pages: Vec<Page<StackSummary>>) {
        lock(&self.state).summaries = pages;
    }

    pub fn set_template(&self, stack: &str, body: &str) {
        lock(&self.state).templates.insert(stack.to_string(), body.to_string());
    }

    /// Make every call of `operation` fail with `error`.
    pub fn fail(&self, operation: &str, error: ProviderError) {
        lock(&self.state).failures.insert(operation.to_string(), error);
    }

    /// Every call so far as `"<operation> <argument>"`.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    /// Every create and update request so far, with its operation.
    pub fn requests(&self) -> Vec<(String, StackRequest)> {
        lock(&self.state).requests.clone()
    }

    fn stack_id(&self, name: &str) -> String {
        format!("arn:aws:cloudformation:{}:000000000000:stack/{name}/1", self.region)
    }

    fn record(
        &self,
        operation: &str,
        argument: &str,
    ) -> Result<MutexGuard<'_, StubState>, ProviderError> {
        let mut state = lock(&self.state);
        state.calls.push(format!("{operation} {argument}"));
        match state.failures.get(operation).cloned() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }

    fn change(&self, operation: &str, request: &StackRequest) -> Result<String, ProviderError> {
        let mut state = self.record(operation, &request.stack_name)?;
        state.requests.push((operation.to_string(), request.clone()));
        let id = self.stack_id(&request.stack_name);
        state.stacks.insert(
            request.stack_name.clone(),
            DeployedStack {
                name: request.stack_name.clone(),
                id: id.clone(),
                status: format!(
                    "{}_IN_PROGRESS",
                    operation.trim_end_matches("_stack").to_uppercase()
                ),
                description: None,
                parameters: request.parameters.clone(),
            },
        );
        Ok(id)
    }
}

impl StackProvider for StubProvider {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_stacks(
        &self,
        token: Option<String>,
    ) -> Result<Page<StackSummary>, ProviderError> {
        let state = self.record("list_stacks", token.as_deref().unwrap_or(""))?;
        page_after(&state.summaries, token.as_deref())
    }

    async fn describe_stack(&self, stack: &str) -> Result<DeployedStack, ProviderError> {
        let state = self.record("describe_stack", stack)?;
        state
            .stacks
            .get(stack)
            .cloned()
            .ok_or_else(|| ProviderError::StackNotFound(stack.to_string()))
    }

    async fn describe_stack_resources(
        &self,
        stack: &str,
    ) -> Result<Vec<StackResource>, ProviderError> {
        let state = self.record("describe_stack_resources", stack)?;
        Ok(state.resources.get(stack).cloned().unwrap_or_default())
    }

    async fn describe_stack_events(
        &self,
        stack: &str,
        token: Option<String>,
    ) -> Result<Page<StackEvent>, ProviderError> {
        let state = self.record("describe_stack_events", stack)?;
        match state.events.get(stack) {
            Some(pages) => page_after(pages, token.as_deref()),
            None => Ok(Page::last(Vec::new())),
        }
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<String, ProviderError> {
        self.change("create_stack", request)
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<String, ProviderError> {
        self.change("update_stack", request)
    }

    async fn get_template(&self, stack: &str) -> Result<String, ProviderError> {
        let state = self.record("get_template", stack)?;
        state
            .templates
            .get(stack)
            .cloned()
            .ok_or_else(|| ProviderError::StackNotFound(stack.to_string()))
    }
}

/// In-memory [`ArtifactStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<(String, String), String>>,
    failing: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upload to `bucket` fail.
    pub fn fail_bucket(&self, bucket: &str) {
        lock(&self.failing).push(bucket.to_string());
    }

    /// Body stored at `key` in `bucket`.
    pub fn object(&self, bucket: &str, key: &str) -> Option<String> {
        lock(&self.objects).get(&(bucket.to_string(), key.to_string())).cloned()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.objects).is_empty()
    }
}

impl ArtifactStore for MemoryStore {
    async fn put(&self, bucket: &str, key: &str, body: &str) -> Result<(), ProviderError> {
        if lock(&self.failing).iter().any(|b| b == bucket) {
            return Err(ProviderError::Rejected {
                code: "AccessDenied".to_string(),
                message: format!("cannot write to {bucket}"),
            });
        }
        lock(&self.objects).insert((bucket.to_string(), key.to_string()), body.to_string());
        Ok(())
    }
}
