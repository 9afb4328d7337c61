//! In-process gateway for tests and local development.
//!
//! NOT A KEY-MANAGEMENT SERVICE: the AES-256-GCM key lives in process memory and
//! dies with it. Tokens look like `mock:v1:<base64(nonce || ciphertext)>`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use aes_gcm::{aead::Aead, Aes256Gcm, KeyInit, Nonce};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use zeroize::Zeroizing;

use super::EncryptionGateway;
use crate::error::{QubitLockError, Result};

const TOKEN_PREFIX: &str = "mock:v1:";
const NONCE_LEN: usize = 12;

/// Gateway double that encrypts locally and counts calls.
pub struct MockGateway {
    key: Zeroizing<[u8; 32]>,
    online: AtomicBool,
    encrypt_calls: AtomicU64,
    decrypt_calls: AtomicU64,
}

impl std::fmt::Debug for MockGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGateway")
            .field("key", &"[REDACTED]")
            .field("online", &self.is_online())
            .finish()
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Create a gateway with a fresh random key.
    pub fn new() -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        rand::thread_rng().fill_bytes(&mut key[..]);
        Self {
            key,
            online: AtomicBool::new(true),
            encrypt_calls: AtomicU64::new(0),
            decrypt_calls: AtomicU64::new(0),
        }
    }

    /// Simulate the service going away (`false`) or coming back (`true`).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Whether calls currently succeed
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Number of encrypt calls received
    pub fn encrypt_calls(&self) -> u64 {
        self.encrypt_calls.load(Ordering::Relaxed)
    }

    /// Number of decrypt calls received
    pub fn decrypt_calls(&self) -> u64 {
        self.decrypt_calls.load(Ordering::Relaxed)
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.key[..])
            .map_err(|e| QubitLockError::Gateway(e.to_string()))
    }

    fn ensure_online(&self) -> Result<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(QubitLockError::Gateway("mock gateway offline".into()))
        }
    }
}

#[async_trait]
impl EncryptionGateway for MockGateway {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        self.encrypt_calls.fetch_add(1, Ordering::Relaxed);
        self.ensure_online()?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| QubitLockError::Gateway(e.to_string()))?;

        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&ciphertext);
        Ok(format!("{}{}", TOKEN_PREFIX, STANDARD.encode(blob)))
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>> {
        self.decrypt_calls.fetch_add(1, Ordering::Relaxed);
        self.ensure_online()?;

        let encoded = ciphertext
            .strip_prefix(TOKEN_PREFIX)
            .ok_or_else(|| QubitLockError::Gateway("unrecognized ciphertext token".into()))?;
        let blob = STANDARD
            .decode(encoded)
            .map_err(|e| QubitLockError::Gateway(format!("invalid token encoding: {e}")))?;
        if blob.len() < NONCE_LEN {
            return Err(QubitLockError::Gateway("ciphertext token too short".into()));
        }
        let (nonce, body) = blob.split_at(NONCE_LEN);
        self.cipher()?
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|_| QubitLockError::Gateway("authentication tag mismatch".into()))
    }

    async fn health(&self) -> bool {
        self.is_online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip() {
        let gw = MockGateway::new();
        let token = gw.encrypt(b"secret").await.unwrap();
        assert!(token.starts_with(TOKEN_PREFIX));
        assert_eq!(gw.decrypt(&token).await.unwrap(), b"secret");
        assert_eq!(gw.encrypt_calls(), 1);
        assert_eq!(gw.decrypt_calls(), 1);
    }

    #[tokio::test]
    async fn tokens_are_randomized() {
        let gw = MockGateway::new();
        let a = gw.encrypt(b"same").await.unwrap();
        let b = gw.encrypt(b"same").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn tampered_token_fails() {
        let gw = MockGateway::new();
        let token = gw.encrypt(b"secret").await.unwrap();
        let mut blob = STANDARD.decode(&token[TOKEN_PREFIX.len()..]).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        let tampered = format!("{}{}", TOKEN_PREFIX, STANDARD.encode(blob));
        assert!(matches!(
            gw.decrypt(&tampered).await,
            Err(QubitLockError::Gateway(_))
        ));
    }

    #[tokio::test]
    async fn other_instance_cannot_decrypt() {
        let token = MockGateway::new().encrypt(b"secret").await.unwrap();
        assert!(MockGateway::new().decrypt(&token).await.is_err());
    }

    #[tokio::test]
    async fn offline_gateway_fails_calls() {
        let gw = MockGateway::new();
        gw.set_online(false);
        assert!(!gw.health().await);
        assert!(gw.encrypt(b"x").await.is_err());
        gw.set_online(true);
        assert!(gw.health().await);
        assert!(gw.encrypt(b"x").await.is_ok());
    }
}
