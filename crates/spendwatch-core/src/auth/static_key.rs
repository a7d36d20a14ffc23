//! Pre-issued token

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Credential;

use super::CredentialProvider;

/// Hands out the configured token unchanged
pub struct StaticKeyProvider {
    token: String,
}

impl StaticKeyProvider {
    /// Create a provider for `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticKeyProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn acquire(&self) -> Result<Credential> {
        Ok(Credential::new(self.token.clone()))
    }
}
