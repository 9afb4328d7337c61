//! Counters for the store/retrieve pipeline.
//!
//! All counters are `AtomicU64` with relaxed ordering; a [`MetricsSnapshot`] is a
//! best-effort point-in-time read, not a consistent cut.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lock-free pipeline counters shared by concurrent operations.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    stores: AtomicU64,
    retrieves: AtomicU64,
    verifies: AtomicU64,
    bytes_in: AtomicU64,
    bytes_after_compression: AtomicU64,
    compressed_files: AtomicU64,
    compression_skipped: AtomicU64,
    decompression_fallbacks: AtomicU64,
    integrity_failures: AtomicU64,
    gateway_errors: AtomicU64,
}

impl PipelineMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed store.
    #[inline]
    pub fn record_store(&self, original: u64, processed: u64, compressed: bool) {
        self.stores.fetch_add(1, Ordering::Relaxed);
        self.bytes_in.fetch_add(original, Ordering::Relaxed);
        self.bytes_after_compression
            .fetch_add(processed, Ordering::Relaxed);
        if compressed {
            self.compressed_files.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record that compression was considered but the original bytes were kept.
    #[inline]
    pub fn record_compression_skipped(&self) {
        self.compression_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed retrieve.
    #[inline]
    pub fn record_retrieve(&self) {
        self.retrieves.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a verify call that produced a result.
    #[inline]
    pub fn record_verify(&self) {
        self.verifies.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a retrieve that returned still-compressed bytes.
    #[inline]
    pub fn record_decompression_fallback(&self) {
        self.decompression_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a root mismatch.
    #[inline]
    pub fn record_integrity_failure(&self) {
        self.integrity_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed gateway call.
    #[inline]
    pub fn record_gateway_error(&self) {
        self.gateway_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let bytes_in = self.bytes_in.load(Ordering::Relaxed);
        let bytes_after_compression = self.bytes_after_compression.load(Ordering::Relaxed);
        let compression_ratio = if bytes_after_compression == 0 {
            1.0
        } else {
            bytes_in as f64 / bytes_after_compression as f64
        };

        MetricsSnapshot {
            stores: self.stores.load(Ordering::Relaxed),
            retrieves: self.retrieves.load(Ordering::Relaxed),
            verifies: self.verifies.load(Ordering::Relaxed),
            bytes_in,
            bytes_after_compression,
            compressed_files: self.compressed_files.load(Ordering::Relaxed),
            compression_skipped: self.compression_skipped.load(Ordering::Relaxed),
            decompression_fallbacks: self.decompression_fallbacks.load(Ordering::Relaxed),
            integrity_failures: self.integrity_failures.load(Ordering::Relaxed),
            gateway_errors: self.gateway_errors.load(Ordering::Relaxed),
            compression_ratio,
        }
    }
}

/// Point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Completed stores
    pub stores: u64,
    /// Completed retrieves
    pub retrieves: u64,
    /// Completed verifies
    pub verifies: u64,
    /// Original bytes stored
    pub bytes_in: u64,
    /// Bytes handed to the gateway after compression
    pub bytes_after_compression: u64,
    /// Stores that kept a compression tag
    pub compressed_files: u64,
    /// Stores where compression was considered but skipped
    pub compression_skipped: u64,
    /// Retrieves that returned still-compressed bytes
    pub decompression_fallbacks: u64,
    /// Root mismatches seen by retrieve or verify
    pub integrity_failures: u64,
    /// Failed gateway calls
    pub gateway_errors: u64,
    /// `bytes_in / bytes_after_compression`, 1.0 when nothing was stored
    pub compression_ratio: f64,
}
