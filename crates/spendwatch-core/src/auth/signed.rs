//! Access/secret key pair signing (AWS Signature Version 4 scheme)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::models::Credential;

use super::{credential_from_response, CredentialProvider};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNING_SERVICE: &str = "iam";
const CONTENT_TYPE: &str = "application/json";
const REQUEST_BODY: &[u8] = b"{}";

/// Headers produced by signing one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// `x-amz-date`
    pub amz_date: String,
    /// `x-amz-content-sha256`
    pub content_sha256: String,
    /// `Authorization`
    pub authorization: String,
}

/// Signs requests with a static access key pair for one region
#[derive(Clone)]
pub struct RequestSigner {
    access_key_id: String,
    secret_access_key: String,
    region: String,
}

impl RequestSigner {
    /// Create a signer
    pub fn new(access_key_id: String, secret_access_key: String, region: String) -> Self {
        Self {
            access_key_id,
            secret_access_key,
            region,
        }
    }

    /// Sign a request sent with `Content-Type: application/json` at `now`
    pub fn sign(
        &self,
        method: &str,
        url: &Url,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<SignedHeaders> {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date = now.format("%Y%m%d").to_string();
        let content_sha256 = hex::encode(Sha256::digest(body));

        let host = match url.port() {
            Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
            None => url.host_str().unwrap_or_default().to_string(),
        };

        let signed_header_names = "content-type;host;x-amz-content-sha256;x-amz-date";
        let canonical_headers = format!(
            "content-type:{CONTENT_TYPE}\nhost:{host}\nx-amz-content-sha256:{content_sha256}\nx-amz-date:{amz_date}\n"
        );

        let path = if url.path().is_empty() { "/" } else { url.path() };
        let canonical_request = format!(
            "{method}\n{path}\n{}\n{canonical_headers}\n{signed_header_names}\n{content_sha256}",
            canonical_query(url)
        );

        let scope = format!("{date}/{}/{SIGNING_SERVICE}/aws4_request", self.region);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = self.signing_key(&date)?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_header_names}, Signature={signature}",
            self.access_key_id
        );

        Ok(SignedHeaders {
            amz_date,
            content_sha256,
            authorization,
        })
    }

    /// Derived key: date, region, service, `aws4_request`
    fn signing_key(&self, date: &str) -> Result<Vec<u8>> {
        let secret = format!("AWS4{}", self.secret_access_key);
        let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, SIGNING_SERVICE.as_bytes())?;
        hmac_sha256(&k_service, b"aws4_request")
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::credential(format!("signing key rejected: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn uri_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(char::from(b));
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Exchanges a signed request for a bearer token
pub struct SignedExchangeProvider {
    client: Client,
    endpoint: String,
    signer: RequestSigner,
}

impl SignedExchangeProvider {
    /// Create a provider signing requests to `endpoint`
    pub fn new(client: Client, endpoint: String, signer: RequestSigner) -> Self {
        Self {
            client,
            endpoint,
            signer,
        }
    }
}

#[async_trait]
impl CredentialProvider for SignedExchangeProvider {
    fn name(&self) -> &'static str {
        "signed"
    }

    async fn acquire(&self) -> Result<Credential> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| Error::credential(format!("invalid identity endpoint: {e}")))?;

        let signed = self.signer.sign("POST", &url, REQUEST_BODY, Utc::now())?;
        debug!(endpoint = %url, "Requesting token with signed request");

        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.content_sha256)
            .header(reqwest::header::AUTHORIZATION, &signed.authorization)
            .body(REQUEST_BODY)
            .send()
            .await
            .map_err(|e| Error::credential(e.to_string()))?;

        credential_from_response(response).await
    }
}
