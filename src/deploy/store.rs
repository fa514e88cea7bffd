//! Uploading rendered artifacts to per-region buckets.

use std::future::Future;

use tracing::info;

use super::provider::ProviderError;
use crate::render::{ArtifactIndex, StorageLayout};

/// Object storage the provisioning API reads templates from.
pub trait ArtifactStore: Send + Sync {
    /// Store `body` as `key` in `bucket`, replacing any previous object.
    fn put(
        &self,
        bucket: &str,
        key: &str,
        body: &str,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;
}

/// Upload every artifact to the bucket of every region, one at a time.
///
/// Keys are content hashes, so re-uploading an unchanged artifact rewrites
/// identical bytes. Returns the number of objects written; the first failure
/// stops the sync.
pub async fn sync_artifacts<S: ArtifactStore>(
    store: &S,
    artifacts: &ArtifactIndex,
    layout: &StorageLayout,
    regions: &[String],
) -> Result<usize, ProviderError> {
    let mut written = 0;
    for region in regions {
        let bucket = layout.bucket(region);
        for artifact in artifacts.iter() {
            store.put(&bucket, artifact.storage_key(), artifact.body()).await?;
            written += 1;
        }
        info!("synced {} templates to {bucket}", artifacts.len());
    }
    Ok(written)
}
