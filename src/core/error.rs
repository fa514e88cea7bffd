//! Error handling for brix
//!
//! Library areas report failures through their own typed errors
//! ([`BuildError`](crate::template::BuildError),
//! [`RenderError`](crate::render::RenderError),
//! [`ProviderError`](crate::deploy::ProviderError)). Commands work in
//! `anyhow::Result` and raise [`BrixError`] for command-level failures.
//!
//! At the top of the binary every error goes through [`user_friendly_error`],
//! which turns it into an [`ErrorContext`]: the error itself plus optional
//! details and a suggestion, printed with colors to stderr.
//!
//! # Examples
//!
//! ```rust,no_run
//! use brix::core::{BrixError, ErrorContext, user_friendly_error};
//!
//! let err = anyhow::Error::from(BrixError::UnknownTemplate {
//!     name: "balanced_nope".to_string(),
//! });
//! user_friendly_error(err).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

use crate::deploy::{DiffError, ProviderError};
use crate::render::RenderError;
use crate::template::BuildError;

/// Command-level failures.
#[derive(Error, Debug)]
pub enum BrixError {
    /// No catalogue template has the given name
    #[error("Unknown template '{name}'")]
    UnknownTemplate {
        /// Name as given on the command line
        name: String,
    },

    /// The region is not among the configured ones
    #[error("Unknown region '{region}'")]
    UnknownRegion {
        region: String,
        /// Configured regions, comma separated
        known: String,
    },

    /// A template needs a setting nobody provided
    #[error("Template '{template}' is missing required setting '{setting}'")]
    MissingConfiguration { template: String, setting: String },

    /// One or more templates failed to build or render
    #[error("{failed} of {total} templates failed to render")]
    ValidationFailed { failed: usize, total: usize },

    /// The provisioning API rejected a request
    #[error("{code}: {message}")]
    ProviderRejection { code: String, message: String },

    /// The configuration file is invalid
    #[error("Invalid configuration: {message}")]
    ConfigError { message: String },

    /// I/O failure
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Anything else, with its message
    #[error("{message}")]
    Other { message: String },
}

impl Clone for BrixError {
    fn clone(&self) -> Self {
        match self {
            Self::UnknownTemplate { name } => Self::UnknownTemplate { name: name.clone() },
            Self::UnknownRegion { region, known } => Self::UnknownRegion {
                region: region.clone(),
                known: known.clone(),
            },
            Self::MissingConfiguration { template, setting } => Self::MissingConfiguration {
                template: template.clone(),
                setting: setting.clone(),
            },
            Self::ValidationFailed { failed, total } => Self::ValidationFailed {
                failed: *failed,
                total: *total,
            },
            Self::ProviderRejection { code, message } => Self::ProviderRejection {
                code: code.clone(),
                message: message.clone(),
            },
            Self::ConfigError { message } => Self::ConfigError { message: message.clone() },
            // io::Error is not Clone; keep its message
            Self::IoError(e) => Self::Other { message: format!("IO error: {e}") },
            Self::Other { message } => Self::Other { message: message.clone() },
        }
    }
}

/// An error plus what the user can do about it.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: BrixError,
    /// How to resolve it, if known
    pub suggestion: Option<String>,
    /// Further explanation, if any
    pub details: Option<String>,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(error: BrixError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print to stderr: the error in red, details in yellow, the suggestion
    /// in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Turn any error reaching the top of a command into an [`ErrorContext`].
///
/// Known error types get a tailored message; anything else keeps its full
/// cause chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(brix_error) = error.downcast_ref::<BrixError>() {
        return create_error_context(brix_error.clone());
    }

    if let Some(provider_error) = error.downcast_ref::<ProviderError>() {
        return provider_error_context(provider_error, &error);
    }

    if let Some(DiffError::Provider(provider_error)) = error.downcast_ref::<DiffError>() {
        return provider_error_context(provider_error, &error);
    }

    if let Some(RenderError::Build(BuildError::MissingConfiguration { template, setting })) =
        error.downcast_ref::<RenderError>()
    {
        return create_error_context(BrixError::MissingConfiguration {
            template: template.clone(),
            setting: setting.clone(),
        });
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(BrixError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of brix.toml");
    }

    let permission_denied = error
        .downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == std::io::ErrorKind::PermissionDenied);
    if permission_denied {
        return ErrorContext::new(BrixError::Other {
            message: error.to_string(),
        })
        .with_suggestion("Check file permissions");
    }

    ErrorContext::new(BrixError::Other {
        message: with_cause_chain(&error),
    })
}

/// `error` followed by a numbered list of its causes.
fn with_cause_chain(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }
    message
}

fn provider_error_context(error: &ProviderError, source: &anyhow::Error) -> ErrorContext {
    match error {
        // "No updates are to be performed" and friends are reported as the
        // API phrased them, on one line.
        ProviderError::Rejected { code, message } if error.is_validation() => {
            ErrorContext::new(BrixError::ProviderRejection {
                code: code.clone(),
                message: message.clone(),
            })
        }
        ProviderError::Rejected { code, .. } => ErrorContext::new(BrixError::Other {
            message: with_cause_chain(source),
        })
        .with_details(format!("The provisioning API failed with status {code}")),
        ProviderError::Transport(_) => ErrorContext::new(BrixError::Other {
            message: error.to_string(),
        })
        .with_suggestion(
            "Check that the AWS CLI is installed and credentials are configured; \
             set aws.command in brix.toml to use another program",
        ),
        ProviderError::StackNotFound(_) | ProviderError::InvalidResponse(_) => {
            ErrorContext::new(BrixError::Other {
                message: error.to_string(),
            })
        }
    }
}

fn create_error_context(error: BrixError) -> ErrorContext {
    match &error {
        BrixError::UnknownTemplate { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'brix templates' to list the available templates"),
        BrixError::UnknownRegion { known, .. } => {
            let details = format!("Configured regions: {known}");
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Add the region to 'regions' in brix.toml")
        }
        BrixError::MissingConfiguration { .. } => ErrorContext::new(error)
            .with_suggestion("Provide the setting in the template's application settings"),
        BrixError::ConfigError { .. } => {
            ErrorContext::new(error).with_suggestion("Fix brix.toml or remove it to use defaults")
        }
        _ => ErrorContext::new(error),
    }
}
