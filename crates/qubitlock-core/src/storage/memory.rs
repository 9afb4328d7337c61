//! In-memory storage backend

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::FileRepository;
use crate::error::{QubitLockError, Result};
use crate::models::{EncryptedPackage, FileMetadata};

#[derive(Default)]
struct Inner {
    entries: HashMap<String, (EncryptedPackage, FileMetadata)>,
    order: Vec<String>,
}

/// In-memory repository. Not persistent: data is lost on drop.
#[derive(Default)]
pub struct InMemoryFileRepository {
    inner: RwLock<Inner>,
}

impl InMemoryFileRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// True if nothing is stored
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    #[cfg(test)]
    pub(crate) async fn overwrite_ciphertext(&self, id: &str, ciphertext: String) {
        if let Some((package, _)) = self.inner.write().await.entries.get_mut(id) {
            package.ciphertext = ciphertext;
        }
    }
}

#[async_trait]
impl FileRepository for InMemoryFileRepository {
    async fn save(
        &self,
        package: EncryptedPackage,
        mut metadata: FileMetadata,
    ) -> Result<FileMetadata> {
        let mut inner = self.inner.write().await;
        if inner.entries.contains_key(&package.id) {
            return Err(QubitLockError::Storage(format!(
                "file {} already exists",
                package.id
            )));
        }

        metadata.storage_name = Some(Uuid::new_v4().simple().to_string());
        let id = package.id.clone();
        inner.order.push(id.clone());
        inner
            .entries
            .insert(id.clone(), (package, metadata.clone()));
        debug!(%id, "stored package in memory");
        Ok(metadata)
    }

    async fn retrieve(&self, id: &str) -> Result<EncryptedPackage> {
        self.inner
            .read()
            .await
            .entries
            .get(id)
            .map(|(package, _)| package.clone())
            .ok_or_else(|| QubitLockError::NotFound(id.to_string()))
    }

    async fn get_metadata(&self, id: &str) -> Result<FileMetadata> {
        self.inner
            .read()
            .await
            .entries
            .get(id)
            .map(|(_, metadata)| metadata.clone())
            .ok_or_else(|| QubitLockError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        if inner.entries.remove(id).is_none() {
            return Ok(false);
        }
        inner.order.retain(|existing| existing != id);
        Ok(true)
    }

    async fn list_metadata(&self, limit: usize, offset: usize) -> Result<Vec<FileMetadata>> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| inner.entries.get(id).map(|(_, metadata)| metadata.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: &str) -> (EncryptedPackage, FileMetadata) {
        let package = EncryptedPackage {
            id: id.to_string(),
            ciphertext: format!("token-{id}"),
            integrity_root: None,
            compression_algorithm: None,
            original_size: 4,
            processed_size: 4,
        };
        let metadata = FileMetadata {
            id: id.to_string(),
            file_name: format!("{id}.bin"),
            uploaded_at: Utc::now(),
            file_size: 4,
            integrity_root: None,
            compression_enabled: false,
            integrity_verified: false,
            original_name: Some(format!("{id}.bin")),
            storage_name: None,
            content_type: Some("application/octet-stream".into()),
        };
        (package, metadata)
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let repo = InMemoryFileRepository::new();
        let (package, metadata) = entry("a");
        let saved = repo.save(package.clone(), metadata).await.unwrap();
        assert!(saved.storage_name.is_some());
        assert_eq!(repo.retrieve("a").await.unwrap(), package);
        assert_eq!(repo.get_metadata("a").await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_not_found() {
        let repo = InMemoryFileRepository::new();
        assert!(matches!(
            repo.retrieve("missing").await,
            Err(QubitLockError::NotFound(_))
        ));
        assert!(matches!(
            repo.get_metadata("missing").await,
            Err(QubitLockError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let repo = InMemoryFileRepository::new();
        let (package, metadata) = entry("a");
        repo.save(package.clone(), metadata.clone()).await.unwrap();
        assert!(matches!(
            repo.save(package, metadata).await,
            Err(QubitLockError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = InMemoryFileRepository::new();
        let (package, metadata) = entry("a");
        repo.save(package, metadata).await.unwrap();
        assert!(repo.delete("a").await.unwrap());
        assert!(!repo.delete("a").await.unwrap());
        assert!(repo.is_empty().await);
        assert!(repo.list_metadata(10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let repo = InMemoryFileRepository::new();
        for id in ["c", "a", "d", "b"] {
            let (package, metadata) = entry(id);
            repo.save(package, metadata).await.unwrap();
        }
        let ids = |v: Vec<FileMetadata>| v.into_iter().map(|m| m.id).collect::<Vec<_>>();
        assert_eq!(ids(repo.list_metadata(10, 0).await.unwrap()), ["c", "a", "d", "b"]);
        assert_eq!(ids(repo.list_metadata(2, 1).await.unwrap()), ["a", "d"]);
        assert!(repo.list_metadata(5, 10).await.unwrap().is_empty());

        repo.delete("a").await.unwrap();
        assert_eq!(ids(repo.list_metadata(10, 0).await.unwrap()), ["c", "d", "b"]);
    }
}
