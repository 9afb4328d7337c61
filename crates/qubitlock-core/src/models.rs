//! Data contracts shared by the pipeline, the gateway and storage backends

use crate::compression::CompressionAlgorithm;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The unit persisted per file: ciphertext plus what is needed to reverse the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPackage {
    /// Globally unique id, shared with the file's [`FileMetadata`]
    pub id: String,
    /// Opaque token returned by the encryption gateway
    pub ciphertext: String,
    /// Integrity root over `ciphertext`, present only if integrity checking was enabled
    pub integrity_root: Option<String>,
    /// Compression applied before encryption, `None` if stored as-is
    pub compression_algorithm: Option<CompressionAlgorithm>,
    /// Payload size before compression
    pub original_size: usize,
    /// Payload size after compression (equals `original_size` when uncompressed)
    pub processed_size: usize,
}

impl EncryptedPackage {
    /// True if the size bookkeeping is consistent with the compression tag.
    pub fn sizes_consistent(&self) -> bool {
        self.compression_algorithm.is_some() || self.processed_size == self.original_size
    }
}

/// User-facing record for a stored file, keyed by the same id as its package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// File id
    pub id: String,
    /// Name the file was stored under
    pub file_name: String,
    /// Creation timestamp, set once
    pub uploaded_at: DateTime<Utc>,
    /// Original, pre-compression size in bytes
    pub file_size: usize,
    /// Copy of the package's integrity root, readable without decrypting
    pub integrity_root: Option<String>,
    /// Whether compression was in effect for this file
    pub compression_enabled: bool,
    /// Whether integrity checking was in effect for this file
    pub integrity_verified: bool,
    /// Name supplied by the uploader
    pub original_name: Option<String>,
    /// Backend handle of the stored blob; `None` until the blob write succeeds
    pub storage_name: Option<String>,
    /// MIME type detected from the file extension
    pub content_type: Option<String>,
}

/// Per-call feature overrides.
///
/// A feature is active only if both the global toggle and the option allow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptOptions {
    /// Allow compression for this call
    pub enable_compression: bool,
    /// Allow integrity-root computation for this call
    pub enable_integrity: bool,
    /// Free-form caller metadata
    pub custom_metadata: HashMap<String, String>,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            enable_compression: true,
            enable_integrity: true,
            custom_metadata: HashMap::new(),
        }
    }
}

impl EncryptOptions {
    /// Options with both features disabled
    pub fn plain() -> Self {
        Self {
            enable_compression: false,
            enable_integrity: false,
            ..Default::default()
        }
    }
}

/// Liveness report for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `UP` when the encryption gateway is reachable, `DEGRADED` otherwise
    pub status: String,
    /// When the probe ran
    pub timestamp: DateTime<Utc>,
    /// Crate version
    pub version: String,
    /// Result of the gateway liveness probe
    pub gateway_reachable: bool,
}

impl HealthStatus {
    /// Build a report from the gateway probe result.
    pub fn from_probe(gateway_reachable: bool) -> Self {
        Self {
            status: if gateway_reachable { "UP" } else { "DEGRADED" }.to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            gateway_reachable,
        }
    }
}

/// Flat record persisted by storage backends: metadata fields plus the package
/// fields needed to rebuild it, with `uploadedAt` as an RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    /// File id
    pub id: String,
    /// Name the file was stored under
    pub file_name: String,
    /// RFC 3339 creation timestamp
    pub uploaded_at: String,
    /// Original size in bytes
    pub file_size: usize,
    /// Integrity root, if any
    pub integrity_root: Option<String>,
    /// Effective compression flag
    pub compression_enabled: bool,
    /// Effective integrity flag
    pub integrity_verified: bool,
    /// Uploader-supplied name
    pub original_name: Option<String>,
    /// Blob handle
    pub storage_name: Option<String>,
    /// MIME type
    pub content_type: Option<String>,
    /// Compression tag of the package
    pub compression_algorithm: Option<CompressionAlgorithm>,
    /// Size after compression
    pub processed_size: usize,
}

impl StoredRecord {
    /// Flatten a package and its metadata into one record.
    pub fn new(package: &EncryptedPackage, metadata: &FileMetadata) -> Self {
        Self {
            id: metadata.id.clone(),
            file_name: metadata.file_name.clone(),
            uploaded_at: metadata.uploaded_at.to_rfc3339(),
            file_size: metadata.file_size,
            integrity_root: metadata.integrity_root.clone(),
            compression_enabled: metadata.compression_enabled,
            integrity_verified: metadata.integrity_verified,
            original_name: metadata.original_name.clone(),
            storage_name: metadata.storage_name.clone(),
            content_type: metadata.content_type.clone(),
            compression_algorithm: package.compression_algorithm,
            processed_size: package.processed_size,
        }
    }

    /// Rebuild the metadata view. Fails if `uploaded_at` is not RFC 3339.
    pub fn metadata(&self) -> Result<FileMetadata, chrono::ParseError> {
        Ok(FileMetadata {
            id: self.id.clone(),
            file_name: self.file_name.clone(),
            uploaded_at: DateTime::parse_from_rfc3339(&self.uploaded_at)?.with_timezone(&Utc),
            file_size: self.file_size,
            integrity_root: self.integrity_root.clone(),
            compression_enabled: self.compression_enabled,
            integrity_verified: self.integrity_verified,
            original_name: self.original_name.clone(),
            storage_name: self.storage_name.clone(),
            content_type: self.content_type.clone(),
        })
    }

    /// Rebuild the package around ciphertext read from the blob store.
    pub fn package(&self, ciphertext: String) -> EncryptedPackage {
        EncryptedPackage {
            id: self.id.clone(),
            ciphertext,
            integrity_root: self.integrity_root.clone(),
            compression_algorithm: self.compression_algorithm,
            original_size: self.file_size,
            processed_size: self.processed_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (EncryptedPackage, FileMetadata) {
        let package = EncryptedPackage {
            id: "0b6f3a8e-5d7c-4b0e-9a55-3f3d2b9c1e11".into(),
            ciphertext: "vault:v1:abc".into(),
            integrity_root: Some("ab".repeat(32)),
            compression_algorithm: Some(CompressionAlgorithm::Zstd),
            original_size: 1000,
            processed_size: 120,
        };
        let metadata = FileMetadata {
            id: package.id.clone(),
            file_name: "notes.txt".into(),
            uploaded_at: Utc::now(),
            file_size: 1000,
            integrity_root: package.integrity_root.clone(),
            compression_enabled: true,
            integrity_verified: true,
            original_name: Some("notes.txt".into()),
            storage_name: Some("blob-1".into()),
            content_type: Some("text/plain".into()),
        };
        (package, metadata)
    }

    #[test]
    fn record_uses_camel_case_keys() {
        let (package, metadata) = sample();
        let json = serde_json::to_value(StoredRecord::new(&package, &metadata)).unwrap();
        for key in [
            "id",
            "fileName",
            "uploadedAt",
            "fileSize",
            "integrityRoot",
            "compressionEnabled",
            "integrityVerified",
            "originalName",
            "storageName",
            "contentType",
            "compressionAlgorithm",
            "processedSize",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["compressionAlgorithm"], "zstd");
        assert!(json["uploadedAt"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn record_rebuilds_package_and_metadata() {
        let (package, metadata) = sample();
        let record = StoredRecord::new(&package, &metadata);
        assert_eq!(record.metadata().unwrap(), metadata);
        assert_eq!(record.package(package.ciphertext.clone()), package);
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let (package, metadata) = sample();
        let mut record = StoredRecord::new(&package, &metadata);
        record.uploaded_at = "yesterday".into();
        assert!(record.metadata().is_err());
    }

    #[test]
    fn size_invariant() {
        let (mut package, _) = sample();
        assert!(package.sizes_consistent());
        package.compression_algorithm = None;
        assert!(!package.sizes_consistent());
        package.processed_size = package.original_size;
        assert!(package.sizes_consistent());
    }

    #[test]
    fn options_default_enable_everything() {
        let opts = EncryptOptions::default();
        assert!(opts.enable_compression && opts.enable_integrity);
        let parsed: EncryptOptions =
            serde_json::from_str(r#"{"enable_compression": false}"#).unwrap();
        assert!(!parsed.enable_compression);
        assert!(parsed.enable_integrity);
        assert!(!EncryptOptions::plain().enable_integrity);
    }

    #[test]
    fn health_status_labels() {
        assert_eq!(HealthStatus::from_probe(true).status, "UP");
        assert_eq!(HealthStatus::from_probe(false).status, "DEGRADED");
    }
}
