//! Token exchange through a typed token service client

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Credential, ServiceAccountKey};

use super::{build_assertion, ensure_success, CredentialProvider};

/// `Create` call of the token service
#[derive(Debug, Clone, Serialize)]
pub struct CreateTokenRequest {
    /// Signed service-account assertion
    pub jwt: String,
}

/// Token service reply
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTokenResponse {
    /// Issued bearer token
    pub iam_token: String,
    /// Token expiry
    pub expires_at: Option<DateTime<Utc>>,
}

/// Client side of the token issuance service
#[async_trait]
pub trait TokenService: Send + Sync {
    /// Address the assertion must name as its audience
    fn endpoint(&self) -> &str;

    /// Exchange an assertion for a token
    async fn create(&self, request: CreateTokenRequest) -> Result<CreateTokenResponse>;
}

/// Token service client speaking the REST gateway
#[derive(Clone)]
pub struct IamTokenServiceClient {
    client: Client,
    endpoint: String,
}

impl IamTokenServiceClient {
    /// Create a client for `endpoint`
    pub fn new(client: Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait]
impl TokenService for IamTokenServiceClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn create(&self, request: CreateTokenRequest) -> Result<CreateTokenResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::credential(e.to_string()))?;

        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::credential(format!("invalid token service reply: {e}")))
    }
}

/// Delegates the assertion exchange to a [`TokenService`]
pub struct SdkExchangeProvider<S = IamTokenServiceClient> {
    service: S,
    key_file_path: PathBuf,
}

impl<S: TokenService> SdkExchangeProvider<S> {
    /// Create a provider
    pub fn new(service: S, key_file_path: impl Into<PathBuf>) -> Self {
        Self {
            service,
            key_file_path: key_file_path.into(),
        }
    }
}

#[async_trait]
impl<S: TokenService> CredentialProvider for SdkExchangeProvider<S> {
    fn name(&self) -> &'static str {
        "sdk"
    }

    async fn acquire(&self) -> Result<Credential> {
        let key = ServiceAccountKey::load(&self.key_file_path).await?;
        let jwt = build_assertion(&key, self.service.endpoint(), Utc::now())?;

        debug!(key_id = %key.id, "Requesting token from token service");

        let reply = self.service.create(CreateTokenRequest { jwt }).await?;

        Ok(Credential::new(reply.iam_token).with_expiry(reply.expires_at))
    }
}
