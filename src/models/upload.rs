//! Transient upload types. Nothing here is ever persisted.

use bytes::Bytes;
use std::path::PathBuf;

/// A file received in a multipart request.
///
/// Lives only for the duration of a create/replace request; the bytes are
/// handed to the blob store and the product row keeps the resulting key.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Filename as sent by the client. Not trusted; sanitized before it
    /// becomes part of a blob key.
    pub original_name: String,

    /// Raw content bytes.
    pub bytes: Bytes,

    /// Content length in bytes.
    pub size_bytes: u64,
}

impl UploadedFile {
    pub fn new(original_name: impl Into<String>, bytes: Bytes) -> Self {
        let size_bytes = bytes.len() as u64;
        Self {
            original_name: original_name.into(),
            bytes,
            size_bytes,
        }
    }
}

/// Receipt for a blob written to the store.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    /// Generated key (random token + sanitized filename). This is the only
    /// image-related value a product row ever holds.
    pub key: String,

    /// Backend-assigned location, here the path on disk.
    pub location: PathBuf,
}
