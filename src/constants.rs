//! Global constants used throughout the brix codebase.
//!
//! Naming conventions, default regions and timeouts that more than one
//! module depends on live here so they stay in one place.

use std::time::Duration;

/// Directory prefix of every artifact's storage key.
pub const STORAGE_PREFIX: &str = "templates";

/// Placeholder substituted with the region in bucket patterns.
pub const REGION_PLACEHOLDER: &str = "{region}";

/// Default bucket naming pattern, one bucket per region.
pub const DEFAULT_BUCKET_PATTERN: &str = "balanced-cfn-{region}";

/// Regions artifacts are synced to when the config does not say otherwise.
pub const DEFAULT_REGIONS: &[&str] = &["us-east-1", "us-west-1", "us-west-2"];

/// Region used when neither `--region` nor the config names one.
pub const DEFAULT_REGION: &str = "us-west-1";

/// Capability acknowledged on every create and update.
pub const DEFAULT_CAPABILITY: &str = "CAPABILITY_IAM";

/// Stack whose events are shown when `events` is given no name.
pub const DEFAULT_EVENTS_STACK: &str = "BalancedRegion";

/// Prefix template names may be given without on the command line.
pub const TEMPLATE_NAME_PREFIX: &str = "balanced_";

/// Default timeout for one provider command (5 minutes).
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(300);

/// Page size requested from paginated provider calls.
pub const PAGE_SIZE: u32 = 100;

/// Name of the config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "brix.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "BRIX_CONFIG";
