//! PostgreSQL spend lookup

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::{Connection, Row};
use tracing::debug;

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};

use super::SpendReader;

/// Reads spend over a fresh, verified TLS connection per call.
///
/// Connections are not pooled; every `read` connects, queries once and closes.
#[derive(Clone)]
pub struct PgSpendReader {
    options: PgConnectOptions,
    query: String,
}

impl PgSpendReader {
    /// Create a reader for the configured server and table
    pub fn new(config: &DatabaseConfig) -> Self {
        Self::with_options(connect_options(config), &config.table)
    }

    /// Create a reader with explicit connection options
    pub fn with_options(options: PgConnectOptions, table: &str) -> Self {
        Self {
            options,
            query: spend_query(table),
        }
    }

    /// SQL issued on every read
    pub fn query(&self) -> &str {
        &self.query
    }

    async fn connect(&self) -> Result<PgConnection> {
        let mut conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        // libpq's target_session_attrs=read-write
        let read_only: std::result::Result<String, sqlx::Error> =
            sqlx::query("SHOW transaction_read_only")
                .fetch_one(&mut conn)
                .await
                .and_then(|row| row.try_get(0));

        let checked = read_only
            .map_err(|e| Error::Connection(e.to_string()))
            .and_then(|flag| check_session(&flag));

        if let Err(e) = checked {
            let _ = conn.close().await;
            return Err(e);
        }

        Ok(conn)
    }

    async fn lookup(&self, conn: &mut PgConnection, key_name: &str) -> Result<Option<f64>> {
        let row = sqlx::query(&self.query)
            .bind(key_name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        row.map(|r| r.try_get::<f64, _>("spend"))
            .transpose()
            .map_err(|e| Error::Query(e.to_string()))
    }
}

#[async_trait]
impl SpendReader for PgSpendReader {
    async fn read(&self, key_name: &str) -> Result<Option<f64>> {
        let mut conn = self.connect().await?;

        let result = self.lookup(&mut conn, key_name).await;

        if let Err(e) = conn.close().await {
            debug!(error = %e, "Error closing database connection");
        }

        result
    }
}

fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .database(&config.name)
        .username(&config.user)
        .password(&config.password)
        .ssl_mode(PgSslMode::VerifyFull)
        .ssl_root_cert(&config.root_cert_path)
}

/// Reject sessions where `transaction_read_only` is on
fn check_session(transaction_read_only: &str) -> Result<()> {
    if transaction_read_only == "off" {
        Ok(())
    } else {
        Err(Error::Connection(
            "server only accepts read-only sessions".to_string(),
        ))
    }
}

fn spend_query(table: &str) -> String {
    format!("SELECT spend FROM {table} WHERE token = $1")
}
