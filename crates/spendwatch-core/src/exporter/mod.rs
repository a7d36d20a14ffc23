//! Exporter - the poll/export loop
//!
//! Each cycle reads the spend for one key, acquires a fresh credential and
//! publishes a single data point. A failure at any step ends that cycle; the loop
//! itself never stops. Cycles are separated by a fixed wait with no backoff.

mod publisher;

pub use publisher::MetricPublisher;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info, warn};

use crate::auth::{build_provider, CredentialProvider};
use crate::config::Config;
use crate::db::{PgSpendReader, SpendReader};

/// What a single cycle ended with
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// Value read and written
    Published(f64),
    /// No row for the key
    Absent,
    /// Database connection or query failed
    ReadFailed,
    /// No credential could be obtained
    CredentialFailed,
    /// The monitoring endpoint rejected or never received the point
    PublishFailed,
}

/// Wait between cycles
#[async_trait]
pub trait Scheduler: Send {
    /// Block until the next cycle is due
    async fn wait(&mut self);
}

/// Sleeps a fixed interval regardless of how the last cycle went
#[derive(Debug, Clone)]
pub struct IntervalScheduler {
    interval: Duration,
}

impl IntervalScheduler {
    /// Create a scheduler sleeping `interval` between cycles
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

#[async_trait]
impl Scheduler for IntervalScheduler {
    async fn wait(&mut self) {
        tokio::time::sleep(self.interval).await;
    }
}

/// The spend exporter
pub struct Exporter {
    key_name: String,
    reader: Box<dyn SpendReader>,
    provider: Box<dyn CredentialProvider>,
    publisher: MetricPublisher,
}

impl Exporter {
    /// Assemble an exporter from its parts
    pub fn new(
        key_name: impl Into<String>,
        reader: Box<dyn SpendReader>,
        provider: Box<dyn CredentialProvider>,
        publisher: MetricPublisher,
    ) -> Self {
        Self {
            key_name: key_name.into(),
            reader,
            provider,
            publisher,
        }
    }

    /// Build the production exporter described by `config`
    pub fn from_config(config: &Config) -> Self {
        let client = Client::new();

        Self::new(
            config.exporter.key_name.clone(),
            Box::new(PgSpendReader::new(&config.database)),
            build_provider(&config.credentials, client.clone()),
            MetricPublisher::new(client, &config.cloud, config.exporter.metric_name.clone()),
        )
    }

    /// Name of the credential variant in use
    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Run one read, acquire, publish sequence
    pub async fn run_cycle(&self) -> CycleOutcome {
        let key = self.key_name.as_str();

        let spend = match self.reader.read(key).await {
            Ok(Some(spend)) => {
                info!(key = %key, spend, "Spend for key");
                spend
            }
            Ok(None) => {
                warn!(key = %key, "No record found for key");
                return CycleOutcome::Absent;
            }
            Err(e) => {
                error!(key = %key, error = %e, "Database error");
                return CycleOutcome::ReadFailed;
            }
        };

        let credential = match self.provider.acquire().await {
            Ok(credential) => credential,
            Err(e) => {
                error!(provider = self.provider.name(), error = %e, "Failed to acquire credential");
                return CycleOutcome::CredentialFailed;
            }
        };

        match self.publisher.publish(key, spend, &credential).await {
            Ok(()) => {
                info!(key = %key, value = spend, "Metric published");
                CycleOutcome::Published(spend)
            }
            Err(e) => {
                error!(key = %key, error = %e, "Failed to publish metric");
                CycleOutcome::PublishFailed
            }
        }
    }

    /// Run cycles forever
    pub async fn run<S: Scheduler>(&self, scheduler: &mut S) {
        info!(key = %self.key_name, provider = self.provider.name(), "Exporter started");

        loop {
            self.run_cycle().await;
            scheduler.wait().await;
        }
    }

    /// Run `cycles` cycles, waiting after each one
    pub async fn run_for<S: Scheduler>(&self, scheduler: &mut S, cycles: usize) -> Vec<CycleOutcome> {
        let mut outcomes = Vec::with_capacity(cycles);

        for _ in 0..cycles {
            outcomes.push(self.run_cycle().await);
            scheduler.wait().await;
        }

        outcomes
    }
}
