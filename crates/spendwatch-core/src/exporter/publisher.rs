//! Metric delivery to the monitoring write endpoint

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::config::CloudConfig;
use crate::error::{Error, Result};
use crate::models::{Credential, MetricPoint, WriteRequest};

/// Writes one spend data point per call
#[derive(Clone)]
pub struct MetricPublisher {
    client: Client,
    url: String,
    folder_id: String,
    service: String,
    metric_name: String,
}

impl MetricPublisher {
    /// Create a publisher for the configured destination
    pub fn new(client: Client, cloud: &CloudConfig, metric_name: impl Into<String>) -> Self {
        Self {
            client,
            url: cloud.monitoring_url.clone(),
            folder_id: cloud.folder_id.clone(),
            service: cloud.service.clone(),
            metric_name: metric_name.into(),
        }
    }

    /// Body for `value` stamped with the current time
    pub fn build_request(&self, key_name: &str, value: f64) -> WriteRequest {
        self.build_request_at(key_name, value, Utc::now())
    }

    /// Body for `value` stamped with `ts`
    pub fn build_request_at(&self, key_name: &str, value: f64, ts: DateTime<Utc>) -> WriteRequest {
        WriteRequest::single(MetricPoint::spend(&self.metric_name, key_name, value, ts))
    }

    /// Send the spend of `key_name`; only a 200 reply counts as success
    pub async fn publish(&self, key_name: &str, value: f64, credential: &Credential) -> Result<()> {
        let body = self.build_request(key_name, value);

        debug!(url = %self.url, key = %key_name, "Publishing metric");

        let response = self
            .client
            .post(&self.url)
            .query(&[
                ("folderId", self.folder_id.as_str()),
                ("service", self.service.as_str()),
            ])
            .header(reqwest::header::AUTHORIZATION, credential.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::PublishTransport(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::PublishHttp {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
