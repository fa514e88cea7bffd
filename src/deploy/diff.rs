//! Deployed-versus-local template comparison.

use similar::TextDiff;
use thiserror::Error;

use super::provider::ProviderError;
use crate::render::canonical::canonicalize_text;

/// Failure to produce a template diff.
#[derive(Error, Debug)]
pub enum DiffError {
    /// Fetching the deployed template failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The deployed template body is not JSON
    #[error("Deployed template '{label}' is not valid JSON: {source}")]
    Deployed {
        label: String,
        source: serde_json::Error,
    },

    /// The local template body is not JSON
    #[error("Local template '{label}' is not valid JSON: {source}")]
    Local {
        label: String,
        source: serde_json::Error,
    },
}

/// Lines of unchanged context around each hunk.
const CONTEXT_LINES: usize = 3;

/// Unified diff from the deployed template to the local one, or `None` when
/// they are the same document.
///
/// Both sides are re-serialized canonically first, so key order and
/// whitespace never show up as changes.
pub fn diff_templates(
    deployed: &str,
    local: &str,
    deployed_label: &str,
    local_label: &str,
) -> Result<Option<String>, DiffError> {
    let deployed = canonicalize_text(deployed).map_err(|source| DiffError::Deployed {
        label: deployed_label.to_string(),
        source,
    })?;
    let local = canonicalize_text(local).map_err(|source| DiffError::Local {
        label: local_label.to_string(),
        source,
    })?;
    if deployed == local {
        return Ok(None);
    }

    let diff = TextDiff::from_lines(&deployed, &local);
    let patch = diff
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(deployed_label, local_label)
        .to_string();
    Ok(Some(patch))
}
