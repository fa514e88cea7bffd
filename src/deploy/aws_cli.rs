//! Provider and artifact store backed by the AWS command line tool.
//!
//! Every call runs one `aws` subprocess with `--output json` and parses its
//! stdout. Failed calls are classified from stderr: the CLI reports API
//! errors as
//!
//! ```text
//! An error occurred (ValidationError) when calling the DescribeStacks operation: Stack with id X does not exist
//! ```
//!
//! which becomes [`ProviderError::StackNotFound`] or
//! [`ProviderError::Rejected`]. Credentials and endpoint selection are left
//! to the CLI.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::process::Command;
use tokio::time::timeout;

use super::provider::{
    DeployedStack, Page, ProviderError, StackEvent, StackProvider, StackRequest, StackResource,
    StackSummary, VALIDATION_ERROR,
};
use super::store::ArtifactStore;
use crate::config::AwsSettings;
use crate::constants::PAGE_SIZE;

/// Builder for one invocation of the AWS CLI.
///
/// ```rust,ignore
/// let body = AwsCommand::new("aws")
///     .args(["cloudformation", "get-template", "--stack-name", "BalancedRegion"])
///     .with_timeout(Some(Duration::from_secs(60)))
///     .execute()
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct AwsCommand {
    program: String,
    args: Vec<String>,
    timeout_duration: Option<Duration>,
    context: Option<String>,
}

impl AwsCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_duration: None,
            context: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add `flag value` when `value` is present.
    pub fn optional(self, flag: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.arg(flag).arg(value),
            None => self,
        }
    }

    /// Kill the command after `duration`; `None` waits forever.
    pub fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Label logged with the command line.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Arguments as they will be passed.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Run the command and return its stdout.
    pub async fn execute(self) -> Result<String, ProviderError> {
        let command_line = format!("{} {}", self.program, self.args.join(" "));
        match &self.context {
            Some(ctx) => tracing::debug!(target: "aws", "({ctx}) Executing command: {command_line}"),
            None => tracing::debug!(target: "aws", "Executing command: {command_line}"),
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());
        let output_future = cmd.output();

        let output = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        target: "aws",
                        "Command timed out after {} seconds: {command_line}",
                        duration.as_secs()
                    );
                    return Err(ProviderError::Transport(format!(
                        "'{command_line}' timed out after {} seconds",
                        duration.as_secs()
                    )));
                }
            },
            None => output_future.await,
        }
        .map_err(|e| ProviderError::Transport(format!("failed to run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::debug!(
                target: "aws",
                "Command failed with exit code: {:?}",
                output.status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "aws", "Error: {}", stderr);
            }
            return Err(classify_failure(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run the command and parse its stdout as JSON.
    pub async fn execute_json<T: DeserializeOwned>(self) -> Result<T, ProviderError> {
        let stdout = self.execute().await?;
        serde_json::from_str(&stdout).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

/// API error reported on stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: String,
    pub operation: String,
    pub message: String,
}

fn api_error_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"An error occurred \((\w+)\) when calling the (\w+) operation: (.*)").ok()
        })
        .as_ref()
}

/// Extract the API error from CLI stderr, if it contains one.
pub fn parse_api_error(stderr: &str) -> Option<ApiError> {
    let captures = api_error_pattern()?.captures(stderr)?;
    Some(ApiError {
        code: captures.get(1)?.as_str().to_string(),
        operation: captures.get(2)?.as_str().to_string(),
        message: captures.get(3)?.as_str().trim().to_string(),
    })
}

fn classify_failure(stderr: &str) -> ProviderError {
    let Some(api) = parse_api_error(stderr) else {
        return ProviderError::Transport(stderr.trim().to_string());
    };
    if api.code == VALIDATION_ERROR && api.message.contains("does not exist") {
        return ProviderError::StackNotFound(stack_in_message(&api.message));
    }
    ProviderError::Rejected {
        code: api.code,
        message: api.message,
    }
}

fn stack_in_message(message: &str) -> String {
    message
        .strip_prefix("Stack with id ")
        .and_then(|rest| rest.strip_suffix(" does not exist"))
        .unwrap_or(message)
        .to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListStacksResponse {
    #[serde(default)]
    stack_summaries: Vec<SummaryRecord>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SummaryRecord {
    stack_name: String,
    stack_status: String,
    template_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeStacksResponse {
    #[serde(default)]
    stacks: Vec<StackRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackRecord {
    stack_name: String,
    stack_id: String,
    stack_status: String,
    description: Option<String>,
    #[serde(default)]
    parameters: Vec<ParameterRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ParameterRecord {
    parameter_key: String,
    #[serde(default)]
    parameter_value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResourcesResponse {
    #[serde(default)]
    stack_resources: Vec<ResourceRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResourceRecord {
    logical_resource_id: String,
    physical_resource_id: Option<String>,
    resource_type: String,
    resource_status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EventsResponse {
    #[serde(default)]
    stack_events: Vec<EventRecord>,
    next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EventRecord {
    stack_name: String,
    logical_resource_id: String,
    resource_type: String,
    resource_status: String,
    resource_status_reason: Option<String>,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StackIdResponse {
    stack_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TemplateResponse {
    template_body: serde_json::Value,
}

impl From<StackRecord> for DeployedStack {
    fn from(record: StackRecord) -> Self {
        Self {
            name: record.stack_name,
            id: record.stack_id,
            status: record.stack_status,
            description: record.description,
            parameters: record
                .parameters
                .into_iter()
                .map(|p| (p.parameter_key, p.parameter_value))
                .collect(),
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "PascalCase")]
struct ParameterArg<'a> {
    parameter_key: &'a str,
    parameter_value: &'a str,
}

fn parameters_argument(parameters: &BTreeMap<String, String>) -> Result<String, ProviderError> {
    let list: Vec<ParameterArg<'_>> = parameters
        .iter()
        .map(|(key, value)| ParameterArg {
            parameter_key: key,
            parameter_value: value,
        })
        .collect();
    serde_json::to_string(&list).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

/// [`StackProvider`] running `aws cloudformation` in one region.
#[derive(Debug, Clone)]
pub struct AwsCliProvider {
    settings: AwsSettings,
    region: String,
}

impl AwsCliProvider {
    pub fn new(settings: AwsSettings, region: impl Into<String>) -> Self {
        Self {
            settings,
            region: region.into(),
        }
    }

    /// `aws cloudformation <operation>` with the shared flags.
    pub fn command(&self, operation: &str) -> AwsCommand {
        AwsCommand::new(&self.settings.command)
            .args(["cloudformation", operation, "--output", "json", "--region"])
            .arg(&self.region)
            .optional("--profile", self.settings.profile.as_deref())
            .with_timeout(Some(self.settings.timeout()))
            .with_context(operation.to_string())
    }

    fn paged(&self, operation: &str, token: Option<&str>) -> AwsCommand {
        self.command(operation)
            .args(["--max-items".to_string(), PAGE_SIZE.to_string()])
            .optional("--starting-token", token)
    }

    fn change_command(
        &self,
        operation: &str,
        request: &StackRequest,
    ) -> Result<AwsCommand, ProviderError> {
        let mut command = self
            .command(operation)
            .args(["--stack-name", request.stack_name.as_str()])
            .args(["--template-url", request.template_url.as_str()])
            .arg("--parameters")
            .arg(parameters_argument(&request.parameters)?);
        if !request.capabilities.is_empty() {
            command = command.arg("--capabilities").args(request.capabilities.iter().cloned());
        }
        Ok(command)
    }
}

impl StackProvider for AwsCliProvider {
    fn region(&self) -> &str {
        &self.region
    }

    async fn list_stacks(
        &self,
        token: Option<String>,
    ) -> Result<Page<StackSummary>, ProviderError> {
        let response: ListStacksResponse =
            self.paged("list-stacks", token.as_deref()).execute_json().await?;
        let items = response
            .stack_summaries
            .into_iter()
            .map(|s| StackSummary {
                name: s.stack_name,
                status: s.stack_status,
                description: s.template_description,
            })
            .collect();
        Ok(Page {
            items,
            next_token: response.next_token,
        })
    }

    async fn describe_stack(&self, stack: &str) -> Result<DeployedStack, ProviderError> {
        let response: DescribeStacksResponse = self
            .command("describe-stacks")
            .args(["--stack-name", stack])
            .execute_json()
            .await?;
        response
            .stacks
            .into_iter()
            .next()
            .map(DeployedStack::from)
            .ok_or_else(|| ProviderError::StackNotFound(stack.to_string()))
    }

    async fn describe_stack_resources(
        &self,
        stack: &str,
    ) -> Result<Vec<StackResource>, ProviderError> {
        let response: ResourcesResponse = self
            .command("describe-stack-resources")
            .args(["--stack-name", stack])
            .execute_json()
            .await?;
        Ok(response
            .stack_resources
            .into_iter()
            .map(|r| StackResource {
                logical_id: r.logical_resource_id,
                physical_id: r.physical_resource_id,
                resource_type: r.resource_type,
                status: r.resource_status,
            })
            .collect())
    }

    async fn describe_stack_events(
        &self,
        stack: &str,
        token: Option<String>,
    ) -> Result<Page<StackEvent>, ProviderError> {
        let response: EventsResponse = self
            .paged("describe-stack-events", token.as_deref())
            .args(["--stack-name", stack])
            .execute_json()
            .await?;
        let items = response
            .stack_events
            .into_iter()
            .map(|e| StackEvent {
                stack_name: e.stack_name,
                logical_id: e.logical_resource_id,
                resource_type: e.resource_type,
                status: e.resource_status,
                reason: e.resource_status_reason,
                timestamp: e.timestamp,
            })
            .collect();
        Ok(Page {
            items,
            next_token: response.next_token,
        })
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<String, ProviderError> {
        let mut command = self.change_command("create-stack", request)?;
        if request.disable_rollback {
            command = command.arg("--disable-rollback");
        }
        let response: StackIdResponse = command.execute_json().await?;
        Ok(response.stack_id)
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<String, ProviderError> {
        let response: StackIdResponse =
            self.change_command("update-stack", request)?.execute_json().await?;
        Ok(response.stack_id)
    }

    async fn get_template(&self, stack: &str) -> Result<String, ProviderError> {
        let response: TemplateResponse = self
            .command("get-template")
            .args(["--stack-name", stack])
            .execute_json()
            .await?;
        match response.template_body {
            serde_json::Value::String(body) => Ok(body),
            body => serde_json::to_string(&body)
                .map_err(|e| ProviderError::InvalidResponse(e.to_string())),
        }
    }
}

/// [`ArtifactStore`] uploading with `aws s3api put-object`.
#[derive(Debug, Clone)]
pub struct S3CliStore {
    settings: AwsSettings,
}

impl S3CliStore {
    pub fn new(settings: AwsSettings) -> Self {
        Self { settings }
    }
}

impl ArtifactStore for S3CliStore {
    async fn put(&self, bucket: &str, key: &str, body: &str) -> Result<(), ProviderError> {
        let staged = tempfile::NamedTempFile::new()
            .map_err(|e| ProviderError::Transport(format!("failed to stage {key}: {e}")))?;
        tokio::fs::write(staged.path(), body)
            .await
            .map_err(|e| ProviderError::Transport(format!("failed to stage {key}: {e}")))?;

        AwsCommand::new(&self.settings.command)
            .args(["s3api", "put-object", "--output", "json", "--bucket", bucket, "--key", key])
            .args(["--content-type", "application/json", "--body"])
            .arg(staged.path().display().to_string())
            .optional("--profile", self.settings.profile.as_deref())
            .with_timeout(Some(self.settings.timeout()))
            .with_context(format!("upload {key}"))
            .execute()
            .await?;
        Ok(())
    }
}
