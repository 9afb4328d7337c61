//! Store/retrieve orchestration: compress → encrypt → fingerprint → persist, and back.
//!
//! The pipeline owns every policy decision: which features are in effect for a
//! file, when compression is abandoned, and when a retrieve must be refused
//! because stored ciphertext no longer matches its integrity root. It holds no
//! lock across gateway or storage calls; concurrent operations on different ids
//! proceed independently.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::compression::{decompress, CompressionOutcome, CompressionSelector};
use crate::config::{FeatureFlags, QubitLockConfig};
use crate::content_type::detect_content_type;
use crate::error::{QubitLockError, Result};
use crate::gateway::EncryptionGateway;
use crate::integrity::compute_root;
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::models::{EncryptOptions, EncryptedPackage, FileMetadata, HealthStatus};
use crate::storage::FileRepository;

/// Configuration for the content pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Global feature toggles
    pub features: FeatureFlags,
    /// Zstd level for text-like payloads
    pub zstd_level: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        QubitLockConfig::default().pipeline()
    }
}

impl QubitLockConfig {
    /// Pipeline settings derived from the full configuration
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            features: self.features,
            zstd_level: self.compression.zstd_level,
        }
    }
}

/// The content pipeline
pub struct ContentPipeline<G: EncryptionGateway + ?Sized, S: FileRepository + ?Sized> {
    config: PipelineConfig,
    selector: CompressionSelector,
    gateway: Arc<G>,
    repository: Arc<S>,
    metrics: Arc<PipelineMetrics>,
}

impl<G: EncryptionGateway + ?Sized, S: FileRepository + ?Sized> ContentPipeline<G, S> {
    /// Create a pipeline over a gateway and a repository
    pub fn new(config: PipelineConfig, gateway: Arc<G>, repository: Arc<S>) -> Self {
        Self {
            config,
            selector: CompressionSelector::new(config.zstd_level),
            gateway,
            repository,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Access pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Shared handle to the pipeline counters
    pub fn metrics_handle(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Point-in-time copy of the pipeline counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    fn on_gateway_error(&self, e: QubitLockError) -> QubitLockError {
        self.metrics.record_gateway_error();
        e
    }

    /// Compress (if enabled), encrypt, fingerprint and persist `data`.
    ///
    /// Empty input is rejected before any gateway or storage call. A gateway
    /// failure aborts the operation with nothing persisted.
    #[instrument(skip(self, data, options), fields(size = data.len()))]
    pub async fn store(
        &self,
        data: &[u8],
        file_name: &str,
        options: &EncryptOptions,
    ) -> Result<FileMetadata> {
        if data.is_empty() {
            warn!("refusing to store empty payload");
            return Err(QubitLockError::EmptyPayload);
        }

        let compression_enabled = self.config.features.compression && options.enable_compression;
        let integrity_enabled = self.config.features.integrity && options.enable_integrity;
        if !options.custom_metadata.is_empty() {
            debug!(keys = options.custom_metadata.len(), "caller metadata attached");
        }

        let outcome = if compression_enabled {
            self.selector.apply(file_name, data)
        } else {
            CompressionOutcome::passthrough(data)
        };
        if compression_enabled && outcome.algorithm.is_none() {
            self.metrics.record_compression_skipped();
        }

        let ciphertext = self
            .gateway
            .encrypt(&outcome.data)
            .await
            .map_err(|e| self.on_gateway_error(e))?;
        if ciphertext.is_empty() {
            self.metrics.record_gateway_error();
            return Err(QubitLockError::Gateway(
                "gateway returned an empty ciphertext token".into(),
            ));
        }

        let integrity_root = integrity_enabled.then(|| compute_root(ciphertext.as_bytes()));
        if let Some(root) = &integrity_root {
            debug!(%root, "integrity root computed over ciphertext");
        }

        let id = Uuid::new_v4().to_string();
        let package = EncryptedPackage {
            id: id.clone(),
            ciphertext,
            integrity_root: integrity_root.clone(),
            compression_algorithm: outcome.algorithm,
            original_size: data.len(),
            processed_size: outcome.processed_size(),
        };
        let metadata = FileMetadata {
            id,
            file_name: file_name.to_string(),
            uploaded_at: Utc::now(),
            file_size: data.len(),
            integrity_root,
            compression_enabled,
            integrity_verified: integrity_enabled,
            original_name: Some(file_name.to_string()),
            storage_name: None,
            content_type: Some(detect_content_type(file_name).to_string()),
        };

        let saved = self.repository.save(package, metadata).await?;
        self.metrics.record_store(
            data.len() as u64,
            outcome.processed_size() as u64,
            outcome.algorithm.is_some(),
        );
        info!(
            id = %saved.id,
            original = data.len(),
            processed = outcome.processed_size(),
            compression = outcome.algorithm.map(|a| a.as_str()).unwrap_or("none"),
            integrity = integrity_enabled,
            "file stored"
        );
        Ok(saved)
    }

    fn check_integrity(&self, package: &EncryptedPackage, expected: &str) -> Result<()> {
        let actual = compute_root(package.ciphertext.as_bytes());
        if actual == expected {
            debug!(id = %package.id, "integrity root matches");
            return Ok(());
        }
        self.metrics.record_integrity_failure();
        error!(id = %package.id, %expected, %actual, "integrity root mismatch");
        Err(QubitLockError::IntegrityViolation {
            id: package.id.clone(),
            expected: expected.to_string(),
            actual,
        })
    }

    /// Fetch, verify (if enabled for the file), decrypt and decompress.
    ///
    /// A root mismatch aborts before decryption, so plaintext of a tampered file
    /// is never produced. A decompression failure returns the decrypted bytes as
    /// they are.
    #[instrument(skip(self))]
    pub async fn retrieve(&self, id: &str) -> Result<Vec<u8>> {
        let package = self.repository.retrieve(id).await?;
        let metadata = self.repository.get_metadata(id).await?;

        if metadata.integrity_verified {
            if let Some(expected) = package.integrity_root.as_deref() {
                self.check_integrity(&package, expected)?;
            }
        }

        let decrypted = self
            .gateway
            .decrypt(&package.ciphertext)
            .await
            .map_err(|e| self.on_gateway_error(e))?;

        let data = match package.compression_algorithm {
            Some(algo) if metadata.compression_enabled => match decompress(&decrypted, algo) {
                Ok(data) => {
                    debug!(%algo, from = decrypted.len(), to = data.len(), "decompressed");
                    data
                }
                Err(e) => {
                    warn!(%id, %algo, error = %e, "decompression failed, returning stored bytes");
                    self.metrics.record_decompression_fallback();
                    decrypted
                }
            },
            _ => decrypted,
        };

        self.metrics.record_retrieve();
        info!(%id, size = data.len(), "file retrieved");
        Ok(data)
    }

    /// Recompute the root over stored ciphertext and compare with the recorded one.
    ///
    /// Fails with `IntegrityNotEnabled` when the file was stored without a root.
    #[instrument(skip(self))]
    pub async fn verify(&self, id: &str) -> Result<bool> {
        let package = self.repository.retrieve(id).await?;
        let expected = package
            .integrity_root
            .as_deref()
            .ok_or_else(|| QubitLockError::IntegrityNotEnabled(id.to_string()))?;

        let intact = self.check_integrity(&package, expected).is_ok();
        self.metrics.record_verify();
        info!(%id, intact, "integrity verified");
        Ok(intact)
    }

    /// Metadata record for `id`
    pub async fn metadata(&self, id: &str) -> Result<FileMetadata> {
        self.repository.get_metadata(id).await
    }

    /// Metadata records in insertion order
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<FileMetadata>> {
        self.repository.list_metadata(limit, offset).await
    }

    /// Remove a file. `Ok(false)` if it did not exist.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let deleted = self.repository.delete(id).await?;
        if deleted {
            info!(%id, "file deleted");
        }
        Ok(deleted)
    }

    /// Probe the encryption gateway for diagnostics.
    pub async fn health(&self) -> HealthStatus {
        HealthStatus::from_probe(self.gateway.health().await)
    }
}
