//! Service-account JWT exchange

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Credential, ServiceAccountKey};

use super::{credential_from_response, CredentialProvider};

/// Validity of a signed assertion
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Claims of the assertion exchanged for a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Service account id
    pub iss: String,
    /// Token endpoint
    pub aud: String,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Expiry, `iat` plus one hour
    pub exp: i64,
}

/// Sign a PS256 assertion for `key` addressed to `audience`
pub fn build_assertion(
    key: &ServiceAccountKey,
    audience: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    let mut header = Header::new(Algorithm::PS256);
    header.kid = Some(key.id.clone());

    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: key.service_account_id.clone(),
        aud: audience.to_string(),
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key_pem()?.as_bytes())
        .map_err(|e| Error::credential(format!("invalid private key: {e}")))?;

    jsonwebtoken::encode(&header, &claims, &encoding_key)
        .map_err(|e| Error::credential(format!("failed to sign assertion: {e}")))
}

/// Loads the key file, signs an assertion and exchanges it over HTTP
pub struct JwtExchangeProvider {
    client: Client,
    key_file_path: PathBuf,
    token_url: String,
}

impl JwtExchangeProvider {
    /// Create a provider
    pub fn new(client: Client, key_file_path: impl Into<PathBuf>, token_url: String) -> Self {
        Self {
            client,
            key_file_path: key_file_path.into(),
            token_url,
        }
    }
}

#[async_trait]
impl CredentialProvider for JwtExchangeProvider {
    fn name(&self) -> &'static str {
        "jwt"
    }

    async fn acquire(&self) -> Result<Credential> {
        let key = ServiceAccountKey::load(&self.key_file_path).await?;
        let assertion = build_assertion(&key, &self.token_url, Utc::now())?;

        debug!(key_id = %key.id, "Exchanging service account assertion");

        let response = self
            .client
            .post(&self.token_url)
            .json(&serde_json::json!({ "jwt": assertion }))
            .send()
            .await
            .map_err(|e| Error::credential(e.to_string()))?;

        credential_from_response(response).await
    }
}

/// Key file backed by a temporary file, signed with the test key pair
#[cfg(test)]
pub(crate) fn key_file_fixture() -> tempfile::NamedTempFile {
    use std::io::Write;

    let record = serde_json::json!({
        "id": "ajekeyid",
        "service_account_id": "ajesaid",
        "created_at": "2024-01-01T00:00:00Z",
        "key_algorithm": "RSA_2048",
        "private_key": format!(
            "PLEASE DO NOT REMOVE THIS LINE! SA Key ID <ajekeyid>\n{}",
            include_str!("../../tests/fixtures/sa_private_key.pem")
        ),
    });

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(record.to_string().as_bytes()).unwrap();
    file
}
