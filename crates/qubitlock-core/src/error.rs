//! Error types for the QubitLock pipeline

/// Broad classification of a [`QubitLockError`], used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller's input was invalid (empty payload, unknown id)
    Input,
    /// The request is valid but the stored file is not in a state that supports it
    State,
    /// An external collaborator (encryption gateway, storage backend) failed
    Dependency,
    /// Stored ciphertext no longer matches its recorded fingerprint
    Integrity,
}

/// All errors that can occur while storing, retrieving or verifying files
#[derive(Debug, thiserror::Error)]
pub enum QubitLockError {
    /// Store was called with zero bytes
    #[error("Cannot store an empty payload")]
    EmptyPayload,
    /// No package or metadata exists for the id
    #[error("File not found: {0}")]
    NotFound(String),
    /// Verification requested for a file stored without an integrity root
    #[error("Integrity checking was not enabled for file {0}")]
    IntegrityNotEnabled(String),
    /// Stored ciphertext hashes to a different root than the one recorded at store time
    #[error("Integrity violation for file {id}: expected root {expected}, computed {actual}")]
    IntegrityViolation {
        /// File id
        id: String,
        /// Root recorded at store time
        expected: String,
        /// Root recomputed from the stored ciphertext
        actual: String,
    },
    /// Encryption gateway unreachable or returned an error status
    #[error("Encryption gateway error: {0}")]
    Gateway(String),
    /// Encryption gateway answered without the required payload field
    #[error("Malformed gateway response: missing {field}")]
    MalformedResponse {
        /// Dotted path of the missing field, e.g. `data.ciphertext`
        field: &'static str,
    },
    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),
    /// Compression operation failed
    #[error("Compression failed: {0}")]
    CompressionFailed(String),
    /// Decompression operation failed
    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),
    /// Record (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QubitLockError {
    /// Classify the error for the caller.
    ///
    /// Compression and decompression failures are absorbed by the pipeline; if they
    /// surface at all they come from direct codec use and count as dependency errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            QubitLockError::EmptyPayload | QubitLockError::NotFound(_) => ErrorKind::Input,
            QubitLockError::IntegrityNotEnabled(_) => ErrorKind::State,
            QubitLockError::IntegrityViolation { .. } => ErrorKind::Integrity,
            QubitLockError::Gateway(_)
            | QubitLockError::MalformedResponse { .. }
            | QubitLockError::Storage(_)
            | QubitLockError::CompressionFailed(_)
            | QubitLockError::DecompressionFailed(_)
            | QubitLockError::Config(_)
            | QubitLockError::Serialization(_)
            | QubitLockError::Io(_) => ErrorKind::Dependency,
        }
    }

    /// True for failures caused by tampered or corrupted stored data.
    pub fn is_integrity_violation(&self) -> bool {
        self.kind() == ErrorKind::Integrity
    }
}

impl From<reqwest::Error> for QubitLockError {
    fn from(e: reqwest::Error) -> Self {
        QubitLockError::Gateway(e.to_string())
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, QubitLockError>;
