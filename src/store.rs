//! Document store capability: list descriptors, fetch raw bytes.
//!
//! Two variants implement this trait — a local-filesystem source
//! ([`crate::store_fs::FilesystemStore`]) and an object-storage source
//! ([`crate::store_object::ObjectStore`]). One is selected at configuration
//! time; the index builder only ever sees the trait.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;

use crate::error::FetchError;
use crate::models::DocumentDescriptor;

/// The capability set the index builder requires from a document source.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short source label used in logs and diagnostics (e.g. `"filesystem"`).
    fn label(&self) -> &str;

    /// List all current document descriptors, sorted by id.
    ///
    /// Fails with [`FetchError::Unavailable`] when the source itself is
    /// unreachable; that fails the rebuild attempt as a whole.
    async fn list(&self) -> Result<Vec<DocumentDescriptor>, FetchError>;

    /// Fetch one document's raw content by descriptor id.
    async fn fetch(&self, id: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetch with exponential backoff on transient errors: 1s, 2s, 4s, ...
///
/// `NotFound` and `PermissionDenied` are returned immediately — retrying
/// cannot help, and the caller skips the document with a diagnostic.
pub async fn fetch_with_retry(
    store: &dyn DocumentStore,
    id: &str,
    max_retries: u32,
) -> Result<Vec<u8>, FetchError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        match store.fetch(id).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) if e.is_transient() => {
                warn!(document = id, attempt, error = %e, "transient fetch error, will retry");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| FetchError::Transient("retries exhausted".to_string())))
}

/// Compile include/exclude glob patterns shared by both store variants.
pub(crate) fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
