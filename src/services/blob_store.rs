//! BlobStore — raw image bytes on local disk, addressed by generated keys.
//!
//! Keys are `{uuid-v4}{sanitized original filename}` and payloads live
//! beneath `base_path/{shard}/{shard}/{key}`, with the two shard levels
//! derived from an MD5 of the key to keep per-directory file counts down.
//! The store holds no state besides the base path; every operation is a
//! plain filesystem call.

use crate::models::upload::{StoredBlob, UploadedFile};
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob `{0}` not found")]
    NotFound(String),
    #[error("failed to write blob `{key}`: {source}")]
    Write {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read blob `{key}`: {source}")]
    Read {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove blob `{key}`: {source}")]
    Remove {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid blob key `{0}`")]
    InvalidKey(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Key-addressed blob storage on the local filesystem.
#[derive(Clone)]
pub struct BlobStore {
    /// Base directory for all blob payloads.
    pub base_path: PathBuf,
}

impl BlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Reject keys that could escape the shard layout.
    ///
    /// Generated keys never contain separators, so anything with a slash,
    /// backslash, `..`, or control bytes did not come from this store.
    fn ensure_key_safe(key: &str) -> StorageResult<()> {
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        if key.contains("..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'/' || b == b'\\' || b == b'\0')
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    /// Two-level shard identifiers for a key: first two MD5 bytes as hex.
    fn shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path `base/{aa}/{bb}/{key}`.
    fn blob_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Generate a collision-free key embedding the sanitized filename.
    fn generate_key(original_name: &str) -> String {
        format!("{}{}", Uuid::new_v4(), sanitize_filename(original_name))
    }

    /// Store each file under a fresh key, in input order.
    ///
    /// Writes go to a temp file and are fsynced before an atomic rename.
    /// The first failing write aborts the whole upload; blobs already
    /// written by the same call are not rolled back.
    pub async fn upload(&self, files: &[UploadedFile]) -> StorageResult<Vec<StoredBlob>> {
        let mut stored = Vec::with_capacity(files.len());
        for file in files {
            let key = Self::generate_key(&file.original_name);
            let location = self.write_blob(&key, &file.bytes).await?;
            debug!(
                key = %key,
                size_bytes = file.size_bytes,
                "stored blob for `{}`",
                file.original_name
            );
            stored.push(StoredBlob { key, location });
        }
        Ok(stored)
    }

    async fn write_blob(&self, key: &str, bytes: &Bytes) -> StorageResult<PathBuf> {
        let write_err = |source: io::Error| StorageError::Write {
            key: key.to_string(),
            source,
        };

        let path = self.blob_path(key);
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| write_err(io::Error::other("blob path missing parent directory")))?;
        fs::create_dir_all(&parent).await.map_err(write_err)?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let result: io::Result<()> = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;
        if let Err(err) = result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(write_err(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(write_err(err));
        }

        Ok(path)
    }

    /// Fetch blob content for an existing key.
    pub async fn get(&self, key: &str) -> StorageResult<Bytes> {
        Self::ensure_key_safe(key)?;
        let path = self.blob_path(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(err) => Err(StorageError::Read {
                key: key.to_string(),
                source: err,
            }),
        }
    }

    /// Delete the blob at `key`. Removing a missing key is not an error.
    pub async fn remove(&self, key: &str) -> StorageResult<()> {
        Self::ensure_key_safe(key)?;
        let path = self.blob_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                if let Some(parent) = path.parent() {
                    self.prune_empty_dirs(parent).await;
                }
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(key, "blob already missing on remove");
                Ok(())
            }
            Err(err) => Err(StorageError::Remove {
                key: key.to_string(),
                source: err,
            }),
        }
    }

    /// Remove now-empty shard directories, stopping at the base path.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(()) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(_) => break,
            }
        }
    }
}

/// Strip path components from a client-supplied filename before it becomes
/// part of a key.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .replace("..", "")
}
