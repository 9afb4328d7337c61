//! Encryption gateway: typed capability over an external key-management service.
//!
//! The pipeline never touches key material. It hands plaintext bytes to an
//! [`EncryptionGateway`] and gets back an opaque ciphertext token, and the reverse
//! on retrieval.

use async_trait::async_trait;

use crate::error::Result;

pub mod mock;
pub mod transit;

pub use mock::MockGateway;
pub use transit::TransitClient;

/// Encrypt/decrypt capability backed by an external service.
#[async_trait]
pub trait EncryptionGateway: Send + Sync {
    /// Encrypt `plaintext`, returning the service's ciphertext token.
    async fn encrypt(&self, plaintext: &[u8]) -> Result<String>;

    /// Decrypt a token previously returned by [`EncryptionGateway::encrypt`].
    async fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>>;

    /// Liveness probe for diagnostics. Never called on the store/retrieve path.
    async fn health(&self) -> bool;
}
