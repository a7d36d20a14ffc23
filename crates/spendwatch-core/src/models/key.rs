//! Service-account authorized key

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Authorized key record as issued for a service account.
///
/// Only `id`, `service_account_id` and `private_key` are used; the remaining
/// fields of the issued file are ignored.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Key id, sent as the JWT `kid`
    pub id: String,

    /// Service account the key belongs to, sent as the JWT `iss`
    pub service_account_id: String,

    /// PEM encoded RSA private key
    pub private_key: String,
}

impl ServiceAccountKey {
    /// Read and parse a key file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::key_file(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    /// Parse a key record from its JSON text
    pub fn from_json(raw: &str) -> Result<Self> {
        let key: Self = serde_json::from_str(raw)
            .map_err(|e| Error::key_file(format!("invalid key record: {e}")))?;

        if key.id.is_empty() || key.service_account_id.is_empty() {
            return Err(Error::key_file("key record is missing id or service_account_id"));
        }

        Ok(key)
    }

    /// Private key with any banner line before the PEM block removed
    pub fn private_key_pem(&self) -> Result<&str> {
        self.private_key
            .find("-----BEGIN")
            .map(|start| &self.private_key[start..])
            .ok_or_else(|| Error::key_file("private_key does not contain a PEM block"))
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("id", &self.id)
            .field("service_account_id", &self.service_account_id)
            .finish_non_exhaustive()
    }
}
