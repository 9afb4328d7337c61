//! Extension-driven compression selection with Zstd and LZ4 codecs

use crate::content_type::extension;
use crate::error::QubitLockError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::{debug, warn};

/// Default Zstd level (1=fastest, 19=best ratio, 3=balanced)
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Extensions whose content is already compressed; recompressing them only burns CPU.
const PRECOMPRESSED_EXTENSIONS: &[&str] = &[
    "zip", "gz", "gzip", "bz2", "bzip2", "xz", "lz", "lzma", "zst", "zstd", "7z", "rar", "tar",
    "tgz", "tbz2", "txz", "tlz", "tzst", "jpg", "jpeg", "png", "gif", "webp", "mp3", "mp4", "avi",
    "mkv", "pdf", "docx", "xlsx", "pptx",
];

/// Text-like extensions that get the higher-ratio algorithm.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "csv", "json", "xml", "log", "html", "htm", "js", "css", "md", "yaml", "yml", "toml",
    "svg",
];

/// Compression scheme applied to a payload before encryption.
///
/// Recorded on the package so retrieval knows how to reverse it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    /// Zstandard: higher ratio, used for text-like content
    Zstd,
    /// LZ4 frame with prepended size: fast fallback for everything else
    Lz4,
}

impl CompressionAlgorithm {
    /// Stable tag persisted in metadata records
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionAlgorithm::Zstd => "zstd",
            CompressionAlgorithm::Lz4 => "lz4",
        }
    }
}

impl std::fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compress data with the given algorithm. `zstd_level` is ignored for LZ4.
pub fn compress(
    data: &[u8],
    algo: CompressionAlgorithm,
    zstd_level: i32,
) -> Result<Vec<u8>, QubitLockError> {
    match algo {
        CompressionAlgorithm::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        CompressionAlgorithm::Zstd => zstd::encode_all(data, zstd_level)
            .map_err(|e| QubitLockError::CompressionFailed(e.to_string())),
    }
}

/// Decompress data using the algorithm that was used for compression.
pub fn decompress(data: &[u8], algo: CompressionAlgorithm) -> Result<Vec<u8>, QubitLockError> {
    match algo {
        CompressionAlgorithm::Lz4 => lz4_flex::decompress_size_prepended(data)
            .map_err(|e| QubitLockError::DecompressionFailed(e.to_string())),
        CompressionAlgorithm::Zstd => {
            zstd::decode_all(data).map_err(|e| QubitLockError::DecompressionFailed(e.to_string()))
        }
    }
}

/// Pick the algorithm for a file name. `None` means the format is already compressed.
pub fn select_algorithm(file_name: &str) -> Option<CompressionAlgorithm> {
    let ext = extension(file_name);
    if PRECOMPRESSED_EXTENSIONS.contains(&ext.as_str()) {
        None
    } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        Some(CompressionAlgorithm::Zstd)
    } else {
        Some(CompressionAlgorithm::Lz4)
    }
}

/// Why a payload was stored uncompressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Extension identifies an already-compressed format
    PrecompressedFormat,
    /// Compressed output was not smaller than the input
    NotSmaller,
    /// The codec failed or produced no output
    CodecFailed,
}

/// Result of running the selector over one payload
#[derive(Debug)]
pub struct CompressionOutcome<'a> {
    /// Bytes to hand to the encryption gateway
    pub data: Cow<'a, [u8]>,
    /// Algorithm applied, `None` when the original bytes are kept
    pub algorithm: Option<CompressionAlgorithm>,
    /// Set when compression was attempted or considered but not applied
    pub skipped: Option<SkipReason>,
    /// Input size in bytes
    pub original_size: usize,
}

impl<'a> CompressionOutcome<'a> {
    /// Outcome for a payload whose compression is disabled: original bytes, no tag.
    pub fn passthrough(data: &'a [u8]) -> Self {
        Self {
            data: Cow::Borrowed(data),
            algorithm: None,
            skipped: None,
            original_size: data.len(),
        }
    }

    /// Size of the bytes that will be encrypted
    pub fn processed_size(&self) -> usize {
        self.data.len()
    }

    /// Fraction of bytes saved, `(original - processed) / original`. Zero when nothing was saved.
    pub fn savings_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        self.original_size.saturating_sub(self.processed_size()) as f64 / self.original_size as f64
    }

    fn uncompressed(data: &'a [u8], reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::passthrough(data)
        }
    }
}

/// Decides whether and how to compress a named payload.
#[derive(Debug, Clone, Copy)]
pub struct CompressionSelector {
    zstd_level: i32,
}

impl Default for CompressionSelector {
    fn default() -> Self {
        Self::new(DEFAULT_ZSTD_LEVEL)
    }
}

impl CompressionSelector {
    /// Create a selector; the level is clamped to Zstd's 1..=19 range.
    pub fn new(zstd_level: i32) -> Self {
        Self {
            zstd_level: zstd_level.clamp(1, 19),
        }
    }

    /// Zstd level in use
    pub fn zstd_level(&self) -> i32 {
        self.zstd_level
    }

    /// Compress `data` if its extension calls for it and the result actually shrinks.
    ///
    /// Never fails: codec errors and non-shrinking output both fall back to the
    /// original bytes with no algorithm tag.
    pub fn apply<'a>(&self, file_name: &str, data: &'a [u8]) -> CompressionOutcome<'a> {
        let Some(algo) = select_algorithm(file_name) else {
            debug!(file_name, "format already compressed, skipping compression");
            return CompressionOutcome::uncompressed(data, SkipReason::PrecompressedFormat);
        };

        let compressed = match compress(data, algo, self.zstd_level) {
            Ok(c) if !c.is_empty() => c,
            Ok(_) => {
                warn!(file_name, %algo, "compressor produced no output, keeping original bytes");
                return CompressionOutcome::uncompressed(data, SkipReason::CodecFailed);
            }
            Err(e) => {
                warn!(file_name, %algo, error = %e, "compression failed, keeping original bytes");
                return CompressionOutcome::uncompressed(data, SkipReason::CodecFailed);
            }
        };

        if compressed.len() >= data.len() {
            debug!(
                original = data.len(),
                compressed = compressed.len(),
                %algo,
                "compression did not shrink payload, storing as-is"
            );
            return CompressionOutcome::uncompressed(data, SkipReason::NotSmaller);
        }

        let outcome = CompressionOutcome {
            data: Cow::Owned(compressed),
            algorithm: Some(algo),
            skipped: None,
            original_size: data.len(),
        };
        debug!(
            original = outcome.original_size,
            compressed = outcome.processed_size(),
            savings_pct = outcome.savings_ratio() * 100.0,
            %algo,
            "payload compressed"
        );
        outcome
    }
}
