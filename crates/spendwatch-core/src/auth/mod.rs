//! Bearer credential acquisition
//!
//! One [`CredentialProvider`] variant is chosen at startup from
//! [`CredentialMode`]. Providers never retry and never cache: the exporter asks
//! for a fresh credential on every cycle.

mod jwt;
mod sdk;
mod signed;
mod static_key;

pub use jwt::{build_assertion, AssertionClaims, JwtExchangeProvider, ASSERTION_LIFETIME_SECS};
pub use sdk::{
    CreateTokenRequest, CreateTokenResponse, IamTokenServiceClient, SdkExchangeProvider,
    TokenService,
};
pub use signed::{RequestSigner, SignedExchangeProvider, SignedHeaders};
pub use static_key::StaticKeyProvider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::Deserialize;

use crate::config::{CredentialMode, CredentialsConfig};
use crate::error::{Error, Result};
use crate::models::Credential;

/// Produces a bearer credential for one publish call
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Variant name used in logs
    fn name(&self) -> &'static str;

    /// Obtain a credential; any failure is returned, never retried
    async fn acquire(&self) -> Result<Credential>;
}

/// Build the provider selected by configuration
pub fn build_provider(config: &CredentialsConfig, client: Client) -> Box<dyn CredentialProvider> {
    match config.mode {
        CredentialMode::Static => Box::new(StaticKeyProvider::new(config.iam_token.clone())),
        CredentialMode::Signed => Box::new(SignedExchangeProvider::new(
            client,
            config.signed_token_url.clone(),
            RequestSigner::new(
                config.access_key_id.clone(),
                config.secret_access_key.clone(),
                config.region.clone(),
            ),
        )),
        CredentialMode::Jwt => Box::new(JwtExchangeProvider::new(
            client,
            config.key_file_path.clone(),
            config.token_url.clone(),
        )),
        CredentialMode::Sdk => Box::new(SdkExchangeProvider::new(
            IamTokenServiceClient::new(client, config.token_url.clone()),
            config.key_file_path.clone(),
        )),
    }
}

/// Token issuance response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    iam_token: Option<String>,
    #[serde(alias = "access_token")]
    access_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

/// Pass a 2xx response through; anything else becomes a credential error with the body
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::credential(format!(
        "token endpoint returned {status}: {body}"
    )))
}

/// Turn a token endpoint response into a credential
async fn credential_from_response(response: Response) -> Result<Credential> {
    let response = ensure_success(response).await?;

    let parsed: TokenResponse = response
        .json()
        .await
        .map_err(|e| Error::credential(format!("invalid token response: {e}")))?;

    let token = parsed
        .iam_token
        .or(parsed.access_token)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::credential("token response carried no token"))?;

    Ok(Credential::new(token).with_expiry(parsed.expires_at))
}
