#![warn(missing_docs)]

//! QubitLock core: compression (Zstd/LZ4), transit encryption, SHA-256 integrity tree, pluggable storage
//!
//! Store path:    Data → Compress (by extension, only if smaller) → Encrypt (gateway) → Integrity root → Persist
//! Retrieve path: Persist → Verify root → Decrypt (gateway) → Decompress → Data

pub mod compression;
pub mod config;
pub mod content_type;
pub mod error;
pub mod gateway;
pub mod integrity;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod storage;

pub use compression::{CompressionAlgorithm, CompressionOutcome, CompressionSelector, SkipReason};
pub use config::{FeatureFlags, QubitLockConfig, StorageConfig, VaultConfig};
pub use content_type::detect_content_type;
pub use error::{ErrorKind, QubitLockError, Result};
pub use gateway::{EncryptionGateway, MockGateway, TransitClient};
pub use integrity::{compute_root, verify_root};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use models::{EncryptOptions, EncryptedPackage, FileMetadata, HealthStatus};
pub use pipeline::{ContentPipeline, PipelineConfig};
pub use storage::{FileRepository, InMemoryFileRepository, LocalFileRepository, DEFAULT_LIST_LIMIT};
