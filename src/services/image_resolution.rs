//! ImageResolution — bridges the "key on write, bytes on read" asymmetry.
//!
//! Writes hand uploaded files to the blob store and come back with a key;
//! reads turn a stored key back into bytes. Read-side failures collapse to
//! `ResolvedImage::Unavailable` so a missing or corrupt image can never
//! fail a product read.

use crate::models::upload::UploadedFile;
use crate::services::blob_store::{BlobStore, StorageResult};
use bytes::Bytes;
use tracing::{debug, warn};

/// Outcome of resolving a stored key into image bytes.
///
/// Not-found, read failures, and "no key set" all collapse into
/// `Unavailable`; the distinction is logged but deliberately not surfaced.
#[derive(Debug, Clone)]
pub enum ResolvedImage {
    Found(Bytes),
    Unavailable,
}

impl ResolvedImage {
    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            ResolvedImage::Found(bytes) => Some(bytes),
            ResolvedImage::Unavailable => None,
        }
    }
}

#[derive(Clone)]
pub struct ImageResolution {
    /// Underlying blob store; also used by the readiness probe.
    pub blobs: BlobStore,
}

impl ImageResolution {
    pub fn new(blobs: BlobStore) -> Self {
        Self { blobs }
    }

    /// Resolve a stored key (`""` = none) into image bytes for a read.
    pub async fn resolve_for_read(&self, key: &str) -> ResolvedImage {
        if key.is_empty() {
            return ResolvedImage::Unavailable;
        }
        match self.blobs.get(key).await {
            Ok(bytes) => ResolvedImage::Found(bytes),
            Err(err) => {
                debug!(key, "preview image unresolvable: {err}");
                ResolvedImage::Unavailable
            }
        }
    }

    /// Store uploaded files and return the key to persist, if any.
    ///
    /// A product references at most one preview image, so only the first
    /// file's key is returned; any additional files in the same request are
    /// stored but left unreferenced. Empty input means the caller keeps
    /// whatever key it already had.
    pub async fn resolve_for_write(
        &self,
        files: &[UploadedFile],
    ) -> StorageResult<Option<String>> {
        if files.is_empty() {
            return Ok(None);
        }
        let stored = self.blobs.upload(files).await?;
        Ok(stored.into_iter().next().map(|blob| blob.key))
    }

    /// Swap a product's image: upload the new files first, then clean up
    /// the old blob best-effort. Returns the key the record should keep.
    ///
    /// With no new files the old key comes back untouched. Removal of the
    /// old blob never blocks the new key; a failure there only leaves a
    /// stale blob behind.
    pub async fn replace_image(
        &self,
        old_key: &str,
        files: &[UploadedFile],
    ) -> StorageResult<String> {
        let Some(new_key) = self.resolve_for_write(files).await? else {
            return Ok(old_key.to_string());
        };

        if !old_key.is_empty() {
            if let Err(err) = self.blobs.remove(old_key).await {
                warn!(old_key, "failed to remove replaced blob: {err}");
            }
        }

        Ok(new_key)
    }
}
