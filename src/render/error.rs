//! Failures raised while rendering a template.

use thiserror::Error;

use crate::template::BuildError;

/// Error raised while rendering one template.
///
/// Rendering is fail-fast within a template; a batch keeps going with the
/// other templates and records this against the failing one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A builder failed
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A reference names something the template does not declare
    #[error("{owner} references unknown {kind} '{target}'")]
    DanglingReference {
        /// Logical id of the node holding the reference
        owner: String,
        /// What kind of target was expected
        kind: &'static str,
        /// Name that was not found
        target: String,
    },

    /// An attribute lookup on a nested stack names an output the embedded
    /// template does not declare
    #[error("{owner} reads output '{output}' of {stack}, but template '{template}' declares no such output")]
    UnknownNestedOutput {
        /// Logical id of the node holding the reference
        owner: String,
        /// Nested stack logical id
        stack: String,
        /// Embedded template
        template: String,
        /// Missing output
        output: String,
    },

    /// A nested stack embeds a template that has not been rendered
    #[error("{stack} embeds template '{template}', which has not been rendered")]
    MissingArtifact {
        /// Nested stack logical id
        stack: String,
        /// Embedded template
        template: String,
    },

    /// The omit sentinel appeared where a value is required
    #[error("{owner} uses an omitted value where one is required")]
    MisplacedOmit {
        /// Logical id of the node holding the value
        owner: String,
    },

    /// A condition expression the backend would reject
    #[error("Condition {condition} is invalid: {reason}")]
    InvalidCondition {
        /// Condition logical id
        condition: String,
        /// What is wrong with it
        reason: String,
    },

    /// Templates embed each other in a loop
    #[error("Nested templates form a cycle: {chain}")]
    CyclicTemplates {
        /// Templates in the cycle
        chain: String,
    },

    /// A template this one embeds failed to render
    #[error("Template '{dependency}' failed to render")]
    DependencyFailed {
        /// Embedded template that failed
        dependency: String,
    },

    /// A template name was rendered twice into one index
    #[error("Template '{template}' has already been rendered")]
    AlreadyRendered {
        /// Template name
        template: String,
    },

    /// A bucket pattern without exactly one `{region}` placeholder
    #[error("Bucket pattern '{pattern}' must contain '{{region}}' exactly once")]
    InvalidBucketPattern {
        /// Offending pattern
        pattern: String,
    },

    /// The document could not be serialized
    #[error("Failed to serialize template: {0}")]
    Serialize(String),
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}
