//! HTTP client for a transit-style encryption service.
//!
//! Requests:
//! - `POST {url}/v1/{mount}/encrypt/{key}` with `{"plaintext": <base64>}` → `data.ciphertext`
//! - `POST {url}/v1/{mount}/decrypt/{key}` with `{"ciphertext": <token>}` → `data.plaintext` (base64)
//! - `GET  {url}/v1/{mount}/keys/{key}` as the liveness probe
//!
//! Every request carries the service token in `X-Vault-Token`.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::EncryptionGateway;
use crate::config::VaultConfig;
use crate::error::{QubitLockError, Result};

const TOKEN_HEADER: &str = "X-Vault-Token";

#[derive(Serialize)]
struct EncryptRequest<'a> {
    plaintext: &'a str,
}

#[derive(Serialize)]
struct DecryptRequest<'a> {
    ciphertext: &'a str,
}

#[derive(Debug, Deserialize)]
struct TransitResponse {
    data: Option<TransitData>,
}

#[derive(Debug, Deserialize)]
struct TransitData {
    ciphertext: Option<String>,
    plaintext: Option<String>,
}

/// Transit encryption client. Holds the service token, never key material.
pub struct TransitClient {
    client: reqwest::Client,
    base_url: String,
    key_name: String,
    token: Zeroizing<String>,
}

impl std::fmt::Debug for TransitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitClient")
            .field("base_url", &self.base_url)
            .field("key_name", &self.key_name)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl TransitClient {
    /// Build a client from configuration.
    pub fn new(config: &VaultConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: format!(
                "{}/v1/{}",
                config.url.trim_end_matches('/'),
                config.mount.trim_matches('/')
            ),
            key_name: config.key_name.clone(),
            token: Zeroizing::new(config.token.clone()),
        })
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/{}/{}", self.base_url, operation, self.key_name)
    }

    async fn post<B: Serialize + ?Sized>(&self, operation: &str, body: &B) -> Result<TransitData> {
        let url = self.endpoint(operation);
        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, self.token.as_str())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%url, %status, "transit request rejected");
            return Err(QubitLockError::Gateway(format!("HTTP {}: {}", status, text.trim())));
        }

        let parsed: TransitResponse = response.json().await?;
        parsed.data.ok_or(QubitLockError::MalformedResponse { field: "data" })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(QubitLockError::MalformedResponse { field })
}

#[async_trait]
impl EncryptionGateway for TransitClient {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let encoded = Zeroizing::new(STANDARD.encode(plaintext));
        let data = self
            .post("encrypt", &EncryptRequest { plaintext: &encoded })
            .await?;
        let ciphertext = required(data.ciphertext, "data.ciphertext")?;
        debug!(plaintext_len = plaintext.len(), "transit encrypt ok");
        Ok(ciphertext)
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<Vec<u8>> {
        let data = self.post("decrypt", &DecryptRequest { ciphertext }).await?;
        let encoded = Zeroizing::new(required(data.plaintext, "data.plaintext")?);
        let plaintext = STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| QubitLockError::Gateway(format!("plaintext is not valid base64: {e}")))?;
        debug!(plaintext_len = plaintext.len(), "transit decrypt ok");
        Ok(plaintext)
    }

    async fn health(&self) -> bool {
        match self
            .client
            .get(self.endpoint("keys"))
            .header(TOKEN_HEADER, self.token.as_str())
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "transit service unreachable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> VaultConfig {
        VaultConfig {
            url: url.to_string(),
            token: "s.token".into(),
            ..Default::default()
        }
    }

    #[test]
    fn endpoints_are_built_from_mount_and_key() {
        let client = TransitClient::new(&config("http://vault:8200/")).unwrap();
        assert_eq!(
            client.endpoint("encrypt"),
            "http://vault:8200/v1/transit/encrypt/qubitlock"
        );
        assert_eq!(
            client.endpoint("keys"),
            "http://vault:8200/v1/transit/keys/qubitlock"
        );
    }

    #[test]
    fn debug_hides_token() {
        let client = TransitClient::new(&config("http://vault:8200")).unwrap();
        assert!(!format!("{:?}", client).contains("s.token"));
    }

    #[test]
    fn empty_payload_field_is_malformed() {
        assert!(matches!(
            required(Some(String::new()), "data.ciphertext"),
            Err(QubitLockError::MalformedResponse {
                field: "data.ciphertext"
            })
        ));
        assert_eq!(required(Some("x".into()), "data.plaintext").unwrap(), "x");
    }

    #[tokio::test]
    async fn unreachable_service_reports_unhealthy() {
        let client = TransitClient::new(&VaultConfig {
            timeout_secs: 1,
            ..config("http://127.0.0.1:9")
        })
        .unwrap();
        assert!(!client.health().await);
        assert!(matches!(
            client.encrypt(b"data").await,
            Err(QubitLockError::Gateway(_))
        ));
    }
}
