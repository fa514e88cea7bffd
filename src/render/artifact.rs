//! Rendered artifacts, the write-once index of them, and where they are stored.

use std::collections::{BTreeMap, BTreeSet};

use super::canonical::content_hash;
use super::error::RenderError;
use crate::constants::{DEFAULT_BUCKET_PATTERN, REGION_PLACEHOLDER, STORAGE_PREFIX};
use crate::template::{Pseudo, Value};

/// `templates/<name>-<hash>.json`
pub fn storage_key(name: &str, hash: &str) -> String {
    format!("{STORAGE_PREFIX}/{name}-{hash}.json")
}

/// One template rendered to canonical text.
///
/// Immutable once produced. The hash and storage key are derived from the
/// body, so an artifact with the same body always lands at the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    name: String,
    body: String,
    hash: String,
    storage_key: String,
    outputs: BTreeSet<String>,
}

impl RenderedArtifact {
    /// Wrap a canonical body, deriving its hash and storage key.
    pub fn new(name: impl Into<String>, body: String, outputs: BTreeSet<String>) -> Self {
        let name = name.into();
        let hash = content_hash(body.as_bytes());
        let storage_key = storage_key(&name, &hash);
        Self {
            name,
            body,
            hash,
            storage_key,
            outputs,
        }
    }

    /// Template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical document text.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Hex content hash of [`RenderedArtifact::body`].
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Object key the artifact is uploaded under.
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Names of the outputs the document declares.
    pub fn outputs(&self) -> &BTreeSet<String> {
        &self.outputs
    }

    /// Whether the document declares output `name`.
    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.contains(name)
    }
}

/// Artifacts rendered so far, by template name.
///
/// Filled once per batch; an entry is never replaced. Nested stack links
/// read from it, so a template must be inserted before anything that embeds
/// it is rendered.
#[derive(Debug, Default)]
pub struct ArtifactIndex {
    artifacts: BTreeMap<String, RenderedArtifact>,
}

impl ArtifactIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an artifact. Rejects a second artifact for the same name.
    pub fn insert(&mut self, artifact: RenderedArtifact) -> Result<(), RenderError> {
        if self.artifacts.contains_key(artifact.name()) {
            return Err(RenderError::AlreadyRendered {
                template: artifact.name().to_string(),
            });
        }
        self.artifacts.insert(artifact.name().to_string(), artifact);
        Ok(())
    }

    /// Artifact for template `name`.
    pub fn get(&self, name: &str) -> Option<&RenderedArtifact> {
        self.artifacts.get(name)
    }

    /// Whether template `name` has been rendered.
    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.contains_key(name)
    }

    /// All artifacts, ordered by name.
    pub fn iter(&self) -> impl Iterator<Item = &RenderedArtifact> {
        self.artifacts.values()
    }

    /// Number of artifacts.
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether nothing has been rendered.
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Maps regions to buckets and storage keys to URLs.
///
/// The bucket name is a pattern containing `{region}`, one bucket per region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    bucket_pattern: String,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            bucket_pattern: DEFAULT_BUCKET_PATTERN.to_string(),
        }
    }
}

impl StorageLayout {
    /// Layout for `bucket_pattern`, which must contain `{region}` exactly once.
    pub fn new(bucket_pattern: impl Into<String>) -> Result<Self, RenderError> {
        let bucket_pattern = bucket_pattern.into();
        if bucket_pattern.matches(REGION_PLACEHOLDER).count() != 1 {
            return Err(RenderError::InvalidBucketPattern {
                pattern: bucket_pattern,
            });
        }
        Ok(Self { bucket_pattern })
    }

    fn halves(&self) -> (&str, &str) {
        self.bucket_pattern
            .split_once(REGION_PLACEHOLDER)
            .unwrap_or((self.bucket_pattern.as_str(), ""))
    }

    /// Bucket holding artifacts for `region`.
    pub fn bucket(&self, region: &str) -> String {
        self.bucket_pattern.replace(REGION_PLACEHOLDER, region)
    }

    /// Public URL of `key` in the bucket for `region`.
    pub fn object_url(&self, region: &str, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{key}", self.bucket(region))
    }

    /// URL of `key` in the bucket of whichever region the stack is deployed
    /// to, resolved by the backend.
    pub fn template_url(&self, key: &str) -> Value {
        let (head, tail) = self.halves();
        Value::join([
            Value::from(format!("https://{head}")),
            Value::pseudo(Pseudo::Region),
            Value::from(format!("{tail}.s3.amazonaws.com/{key}")),
        ])
    }

    /// ARN matching every object in the bucket of the deploying region.
    pub fn objects_arn(&self) -> Value {
        let (head, tail) = self.halves();
        Value::join([
            Value::from(format!("arn:aws:s3:::{head}")),
            Value::pseudo(Pseudo::Region),
            Value::from(format!("{tail}/*")),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str, body: &str) -> RenderedArtifact {
        RenderedArtifact::new(name, body.to_string(), BTreeSet::new())
    }

    #[test]
    fn test_storage_key_embeds_name_and_hash() {
        let a = artifact("balanced_az", "{}");
        assert_eq!(a.storage_key(), format!("templates/balanced_az-{}.json", a.hash()));
    }

    #[test]
    fn test_index_is_write_once() {
        let mut index = ArtifactIndex::new();
        index.insert(artifact("a", "{}")).unwrap();
        let err = index.insert(artifact("a", "{ }")).unwrap_err();
        assert!(matches!(err, RenderError::AlreadyRendered { .. }));
        assert_eq!(index.get("a").map(RenderedArtifact::body), Some("{}"));
    }

    #[test]
    fn test_default_layout_urls() {
        let layout = StorageLayout::default();
        assert_eq!(layout.bucket("us-west-1"), "balanced-cfn-us-west-1");
        assert_eq!(
            layout.object_url("us-west-1", "templates/x.json"),
            "https://balanced-cfn-us-west-1.s3.amazonaws.com/templates/x.json"
        );
        assert_eq!(
            layout.template_url("templates/x.json"),
            Value::join([
                Value::from("https://balanced-cfn-"),
                Value::pseudo(Pseudo::Region),
                Value::from(".s3.amazonaws.com/templates/x.json"),
            ])
        );
    }

    #[test]
    fn test_pattern_requires_region_placeholder() {
        assert!(StorageLayout::new("static-bucket").is_err());
        assert!(StorageLayout::new("{region}-{region}").is_err());
        let layout = StorageLayout::new("cfn-{region}-artifacts").unwrap();
        assert_eq!(layout.bucket("eu-west-1"), "cfn-eu-west-1-artifacts");
    }
}
