//! Storage port: persistence of encrypted packages and their metadata records.
//!
//! ## Backends
//!
//! | Backend                  | Use Case                       |
//! |--------------------------|--------------------------------|
//! | `InMemoryFileRepository` | Unit tests, ephemeral runs     |
//! | `LocalFileRepository`    | Single-node filesystem storage |
//!
//! Backends write the ciphertext blob first and the metadata record last, so a
//! record never points at a blob that was not written.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{EncryptedPackage, FileMetadata};

mod local;
mod memory;

pub use local::LocalFileRepository;
pub use memory::InMemoryFileRepository;

/// Default page size for [`FileRepository::list_metadata`] callers
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Id-keyed persistence for packages and metadata.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Persist a package and its metadata. Returns the metadata with `storage_name` set.
    async fn save(&self, package: EncryptedPackage, metadata: FileMetadata)
        -> Result<FileMetadata>;

    /// Load the package for `id`.
    ///
    /// Returns `QubitLockError::NotFound` if the id is unknown.
    async fn retrieve(&self, id: &str) -> Result<EncryptedPackage>;

    /// Load the metadata record for `id`.
    ///
    /// Returns `QubitLockError::NotFound` if the id is unknown.
    async fn get_metadata(&self, id: &str) -> Result<FileMetadata>;

    /// Remove both the blob and the metadata record. `Ok(false)` if nothing was stored.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Metadata records in insertion order, skipping `offset` and returning at most `limit`.
    async fn list_metadata(&self, limit: usize, offset: usize) -> Result<Vec<FileMetadata>>;
}
