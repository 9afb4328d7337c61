//! Local filesystem storage backend

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::FileRepository;
use crate::error::{QubitLockError, Result};
use crate::models::{EncryptedPackage, FileMetadata, StoredRecord};

const BLOB_DIR: &str = "blobs";
const METADATA_DIR: &str = "metadata";
const INDEX_FILE: &str = "index";

/// Filesystem repository.
///
/// Structure:
/// - `{root}/blobs/{storage_name}`: raw ciphertext token
/// - `{root}/metadata/{id}.json`: flat camelCase record
/// - `{root}/index`: file ids in insertion order, one per line
pub struct LocalFileRepository {
    root: PathBuf,
    index_lock: Mutex<()>,
}

impl LocalFileRepository {
    /// Open (or create) a repository rooted at `root`.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(BLOB_DIR)).await?;
        fs::create_dir_all(root.join(METADATA_DIR)).await?;
        Ok(Self {
            root,
            index_lock: Mutex::new(()),
        })
    }

    /// Root directory of this repository
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the blob behind a storage handle
    pub fn blob_path(&self, storage_name: &str) -> PathBuf {
        self.root.join(BLOB_DIR).join(storage_name)
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(METADATA_DIR).join(format!("{key}.json"))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    /// Ids must be canonical UUIDs; anything else cannot name a file here.
    fn key(id: &str) -> Result<String> {
        Uuid::parse_str(id)
            .ok()
            .map(|uuid| uuid.hyphenated().to_string())
            .filter(|canonical| canonical == id)
            .ok_or_else(|| QubitLockError::NotFound(id.to_string()))
    }

    async fn read_record(&self, id: &str) -> Result<StoredRecord> {
        let key = Self::key(id)?;
        match fs::read(self.record_path(&key)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(QubitLockError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_index(&self) -> Result<Vec<String>> {
        match fs::read_to_string(self.index_path()).await {
            Ok(text) => Ok(text
                .lines()
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn append_index(&self, key: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.index_path())
            .await?;
        file.write_all(format!("{key}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn remove_if_present(path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FileRepository for LocalFileRepository {
    async fn save(
        &self,
        package: EncryptedPackage,
        mut metadata: FileMetadata,
    ) -> Result<FileMetadata> {
        let key = Self::key(&package.id)
            .map_err(|_| QubitLockError::Storage(format!("invalid file id {}", package.id)))?;
        let record_path = self.record_path(&key);
        if fs::try_exists(&record_path).await? {
            return Err(QubitLockError::Storage(format!(
                "file {} already exists",
                package.id
            )));
        }

        let storage_name = Uuid::new_v4().simple().to_string();
        let blob_path = self.blob_path(&storage_name);
        fs::write(&blob_path, package.ciphertext.as_bytes()).await?;
        metadata.storage_name = Some(storage_name);

        let record = serde_json::to_vec_pretty(&StoredRecord::new(&package, &metadata))?;
        let _guard = self.index_lock.lock().await;
        let written = match Self::write_atomic(&record_path, &record).await {
            Ok(()) => self.append_index(&key).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!(id = %package.id, error = %e, "metadata write failed, removing blob");
            for path in [&record_path, &blob_path] {
                if let Err(cleanup) = Self::remove_if_present(path).await {
                    warn!(
                        id = %package.id,
                        path = %path.display(),
                        error = %cleanup,
                        "rollback removal failed, file left orphaned"
                    );
                }
            }
            return Err(e);
        }

        debug!(id = %package.id, path = %blob_path.display(), "stored package on disk");
        Ok(metadata)
    }

    async fn retrieve(&self, id: &str) -> Result<EncryptedPackage> {
        let record = self.read_record(id).await?;
        let storage_name = record.storage_name.as_deref().ok_or_else(|| {
            QubitLockError::Storage(format!("record {id} has no blob handle"))
        })?;
        let bytes = match fs::read(self.blob_path(storage_name)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(QubitLockError::Storage(format!(
                    "blob {storage_name} for {id} is missing"
                )))
            }
            Err(e) => return Err(e.into()),
        };
        // Corrupted bytes must still reach the root comparison, so decode lossily.
        let ciphertext = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => {
                warn!(%id, blob = %storage_name, "blob is not valid UTF-8, decoding lossily");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };
        Ok(record.package(ciphertext))
    }

    async fn get_metadata(&self, id: &str) -> Result<FileMetadata> {
        self.read_record(id)
            .await?
            .metadata()
            .map_err(|e| QubitLockError::Storage(format!("bad uploadedAt in record {id}: {e}")))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.index_lock.lock().await;
        let record = match self.read_record(id).await {
            Ok(record) => record,
            Err(QubitLockError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let key = Self::key(id)?;

        // Record before blob so a racing reader gets NotFound, not a dangling handle.
        let removed = Self::remove_if_present(&self.record_path(&key)).await?;
        if let Some(storage_name) = record.storage_name.as_deref() {
            Self::remove_if_present(&self.blob_path(storage_name)).await?;
        }

        let remaining: String = self
            .read_index()
            .await?
            .into_iter()
            .filter(|entry| *entry != key)
            .map(|entry| entry + "\n")
            .collect();
        Self::write_atomic(&self.index_path(), remaining.as_bytes()).await?;

        debug!(%id, "deleted package from disk");
        Ok(removed)
    }

    async fn list_metadata(&self, limit: usize, offset: usize) -> Result<Vec<FileMetadata>> {
        let ids = self.read_index().await?;
        let mut out = Vec::with_capacity(limit.min(ids.len()));
        for id in ids.iter().skip(offset).take(limit) {
            match self.get_metadata(id).await {
                Ok(metadata) => out.push(metadata),
                Err(QubitLockError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}
