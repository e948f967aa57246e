// runlog-server/src/blobstore.rs
// ============================================================================
// Module: Artifact Blob Store
// Description: Content-addressed local-disk storage backing artifact bytes.
// Purpose: Store's Artifact row only carries an opaque storage_ref; this is
//          the pluggable backend that resolves it into actual bytes.
// Dependencies: sha2
// ============================================================================

//! ## Overview
//! [`ArtifactBlobStore`] is a pluggable backend for artifact bytes.
//! [`LocalDiskBlobStore`] lays blobs out as
//! `<root>/<first 2 hex chars>/<content_hash>` so no directory holds more
//! than 256 fan-out buckets' worth of artifacts, and returns the hash
//! itself as the `storage_ref` an [`runlog_core::Artifact`] row carries.

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

/// Errors raised while reading or writing artifact bytes.
#[derive(Debug, Error)]
pub enum BlobStoreError {
    /// The blob root or a part file could not be read or written.
    #[error("blob store io error: {0}")]
    Io(String),
    /// The resolved path escaped the configured root.
    #[error("unsafe_path: {0}")]
    UnsafePath(String),
    /// No blob exists for the given storage reference.
    #[error("artifact_not_found: no blob for storage ref {0}")]
    NotFound(String),
}

impl From<io::Error> for BlobStoreError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// A content-addressed local-disk artifact blob store.
#[derive(Debug, Clone)]
pub struct LocalDiskBlobStore {
    root: PathBuf,
}

impl LocalDiskBlobStore {
    /// Builds a blob store rooted at `root`, creating it if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`BlobStoreError::Io`] if `root` cannot be created.
    pub fn new(root: PathBuf) -> Result<Self, BlobStoreError> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn blob_path(&self, content_hash: &str) -> Result<PathBuf, BlobStoreError> {
        if content_hash.len() < 3 || !content_hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(BlobStoreError::UnsafePath(content_hash.to_string()));
        }
        let (bucket, _) = content_hash.split_at(2);
        let dir = self.root.join(bucket);
        let path = dir.join(content_hash);
        if !path.starts_with(&self.root) {
            return Err(BlobStoreError::UnsafePath(content_hash.to_string()));
        }
        Ok(path)
    }

    /// Writes `bytes`, returning the hex-encoded sha256 content hash that
    /// becomes both the artifact's `content_hash` and its `storage_ref`.
    ///
    /// # Errors
    ///
    /// Returns [`BlobStoreError::Io`] on write failure.
    pub fn put(&self, bytes: &[u8]) -> Result<String, BlobStoreError> {
        let content_hash = hash_bytes(bytes);
        let path = self.blob_path(&content_hash)?;
        if path.exists() {
            return Ok(content_hash);
        }
        fs::create_dir_all(path.parent().expect("blob_path always has a parent"))?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &path)?;
        Ok(content_hash)
    }

    /// Reads the bytes stored under `storage_ref`.
    ///
    /// # Errors
    ///
    /// Returns [`BlobStoreError::NotFound`] if no blob exists, or
    /// [`BlobStoreError::UnsafePath`] if `storage_ref` is malformed.
    pub fn get(&self, storage_ref: &str) -> Result<Vec<u8>, BlobStoreError> {
        let path = self.blob_path(storage_ref)?;
        fs::read(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                BlobStoreError::NotFound(storage_ref.to_string())
            } else {
                BlobStoreError::Io(err.to_string())
            }
        })
    }

    /// Root directory blobs are written under, for display/diagnostics.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Hex-encoded sha256 of `bytes`.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_blob() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalDiskBlobStore::new(dir.path().to_path_buf()).expect("store builds");
        let content_hash = store.put(b"hello world").expect("put succeeds");
        let bytes = store.get(&content_hash).expect("get succeeds");
        assert_eq!(bytes, b"hello world");
    }

    #[test]
    fn put_is_idempotent_for_identical_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalDiskBlobStore::new(dir.path().to_path_buf()).expect("store builds");
        let first = store.put(b"same").expect("first put succeeds");
        let second = store.put(b"same").expect("second put succeeds");
        assert_eq!(first, second);
    }

    #[test]
    fn missing_blob_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalDiskBlobStore::new(dir.path().to_path_buf()).expect("store builds");
        let err = store
            .get("0000000000000000000000000000000000000000000000000000000000000000")
            .unwrap_err();
        assert!(matches!(err, BlobStoreError::NotFound(_)));
    }

    #[test]
    fn rejects_a_malformed_storage_ref() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalDiskBlobStore::new(dir.path().to_path_buf()).expect("store builds");
        let err = store.get("../../etc/passwd").unwrap_err();
        assert!(matches!(err, BlobStoreError::UnsafePath(_)));
    }
}
