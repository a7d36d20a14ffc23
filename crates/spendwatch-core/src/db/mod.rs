//! Spend store access
//!
//! The store is read-only from here: one parameterized lookup per call.

mod postgres;

pub use postgres::PgSpendReader;

use async_trait::async_trait;

use crate::error::Result;

/// Source of the accumulated spend for a key
#[async_trait]
pub trait SpendReader: Send + Sync {
    /// Look up the spend recorded for `key_name`.
    ///
    /// `Ok(None)` means no row matched; that is not an error.
    async fn read(&self, key_name: &str) -> Result<Option<f64>>;
}
