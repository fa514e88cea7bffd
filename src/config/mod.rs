//! Configuration for brix
//!
//! Configuration is an optional TOML file. It is looked up, in order, at the
//! path given with `--config`, the path in the `BRIX_CONFIG` environment
//! variable and `brix.toml` in the working directory. When none exists the
//! defaults apply, which match the original deployment.
//!
//! # Format
//!
//! ```toml
//! regions = ["us-east-1", "us-west-1", "us-west-2"]
//! default_region = "us-west-1"
//! bucket = "balanced-cfn-{region}"
//! capabilities = ["CAPABILITY_IAM"]
//!
//! [aws]
//! command = "aws"
//! profile = "deploy"
//! timeout_secs = 300
//! ```
//!
//! Every key is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use crate::constants::{
    CONFIG_ENV_VAR, CONFIG_FILE_NAME, DEFAULT_BUCKET_PATTERN, DEFAULT_CAPABILITY,
    DEFAULT_PROVIDER_TIMEOUT, DEFAULT_REGION, DEFAULT_REGIONS, REGION_PLACEHOLDER,
};
use crate::core::BrixError;
use crate::render::StorageLayout;

/// Settings for every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrixConfig {
    /// Regions artifacts are synced to; commands may only target these
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,

    /// Region used when `--region` is not given
    #[serde(default = "default_region")]
    pub default_region: String,

    /// Artifact bucket pattern containing `{region}`
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Capabilities acknowledged on create and update
    #[serde(default = "default_capabilities")]
    pub capabilities: Vec<String>,

    /// How the AWS CLI is invoked
    #[serde(default)]
    pub aws: AwsSettings,
}

/// Invocation of the AWS command line tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsSettings {
    /// Program to run
    #[serde(default = "default_aws_command")]
    pub command: String,

    /// Named credentials profile; the CLI's own default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Seconds one CLI call may take
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_regions() -> Vec<String> {
    DEFAULT_REGIONS.iter().map(|r| (*r).to_string()).collect()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_bucket() -> String {
    DEFAULT_BUCKET_PATTERN.to_string()
}

fn default_capabilities() -> Vec<String> {
    vec![DEFAULT_CAPABILITY.to_string()]
}

fn default_aws_command() -> String {
    "aws".to_string()
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT.as_secs()
}

impl Default for BrixConfig {
    fn default() -> Self {
        Self {
            regions: default_regions(),
            default_region: default_region(),
            bucket: default_bucket(),
            capabilities: default_capabilities(),
            aws: AwsSettings::default(),
        }
    }
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            command: default_aws_command(),
            profile: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AwsSettings {
    /// Time limit for one CLI call.
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BrixConfig {
    /// Load the configuration from the first location that names a file.
    ///
    /// An explicit path must exist; the working-directory file is optional.
    ///
    /// # Errors
    ///
    /// Fails when an explicit file is missing, unreadable, not valid TOML, or
    /// does not pass [`validate`](Self::validate).
    pub async fn load(explicit: Option<PathBuf>) -> Result<Self> {
        let explicit = explicit.or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));
        let config = match explicit {
            Some(path) => Self::load_from(&path).await?,
            None => {
                let local = PathBuf::from(CONFIG_FILE_NAME);
                if local.exists() {
                    Self::load_from(&local).await?
                } else {
                    debug!("no {CONFIG_FILE_NAME} found, using defaults");
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Read and parse the file at `path` without validating it.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject settings no command could work with.
    pub fn validate(&self) -> Result<(), BrixError> {
        if self.regions.is_empty() {
            return Err(BrixError::ConfigError {
                message: "'regions' must list at least one region".to_string(),
            });
        }
        if !self.regions.contains(&self.default_region) {
            return Err(BrixError::ConfigError {
                message: format!(
                    "default region '{}' is not one of the configured regions",
                    self.default_region
                ),
            });
        }
        if self.bucket.matches(REGION_PLACEHOLDER).count() != 1 {
            return Err(BrixError::ConfigError {
                message: format!(
                    "bucket '{}' must contain {REGION_PLACEHOLDER} exactly once",
                    self.bucket
                ),
            });
        }
        Ok(())
    }

    /// `region` if configured, else the default region.
    pub fn require_region(&self, region: Option<&str>) -> Result<String, BrixError> {
        let region = region.unwrap_or(&self.default_region);
        if self.regions.iter().any(|r| r == region) {
            Ok(region.to_string())
        } else {
            Err(BrixError::UnknownRegion {
                region: region.to_string(),
                known: self.regions.join(", "),
            })
        }
    }

    /// Storage layout for the configured bucket pattern.
    pub fn layout(&self) -> Result<StorageLayout, BrixError> {
        StorageLayout::new(self.bucket.as_str()).map_err(|e| BrixError::ConfigError {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = BrixConfig::default();
        assert_eq!(config.regions, vec!["us-east-1", "us-west-1", "us-west-2"]);
        assert_eq!(config.default_region, "us-west-1");
        assert_eq!(config.capabilities, vec!["CAPABILITY_IAM"]);
        assert_eq!(config.aws.timeout(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("brix.toml");
        std::fs::write(&path, "bucket = \"cfn-{region}\"\n[aws]\nprofile = \"ops\"\n").unwrap();

        let config = BrixConfig::load_from(&path).await.unwrap();
        assert_eq!(config.bucket, "cfn-{region}");
        assert_eq!(config.aws.profile.as_deref(), Some("ops"));
        assert_eq!(config.aws.command, "aws");
        assert_eq!(config.default_region, "us-west-1");
    }

    #[tokio::test]
    async fn test_unknown_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("brix.toml");
        std::fs::write(&path, "buckets = \"x\"\n").unwrap();
        assert!(BrixConfig::load_from(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = BrixConfig::load(Some(dir.path().join("absent.toml"))).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "regions = [\"eu-west-1\"]\ndefault_region = \"eu-west-1\"\n")
            .unwrap();

        // SAFETY: serialized with every other test touching the environment
        unsafe { std::env::set_var(CONFIG_ENV_VAR, &path) };
        let config = BrixConfig::load(None).await;
        unsafe { std::env::remove_var(CONFIG_ENV_VAR) };

        assert_eq!(config.unwrap().regions, vec!["eu-west-1"]);
    }

    #[test]
    fn test_validation_failures() {
        let mut config = BrixConfig {
            regions: Vec::new(),
            ..BrixConfig::default()
        };
        assert!(config.validate().is_err());

        config.regions = vec!["us-east-1".to_string()];
        assert!(config.validate().is_err(), "default region outside the list");

        config.default_region = "us-east-1".to_string();
        config.bucket = "static".to_string();
        assert!(config.validate().is_err());

        config.bucket = "b-{region}".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_require_region() {
        let config = BrixConfig::default();
        assert_eq!(config.require_region(None).unwrap(), "us-west-1");
        assert_eq!(config.require_region(Some("us-east-1")).unwrap(), "us-east-1");
        let err = config.require_region(Some("eu-west-1")).unwrap_err();
        assert!(matches!(err, BrixError::UnknownRegion { ref known, .. } if known.contains("us-west-2")));
    }
}
