//! # SpendWatch
//!
//! Periodic exporter of API key spend into cloud monitoring.
//!
//! SpendWatch reads the accumulated spend of one key from PostgreSQL and writes it
//! as a time-series data point to the monitoring backend, authenticating with a
//! bearer credential obtained fresh on every cycle.
//!
//! ## Architecture
//!
//! - **Reader**: one verified TLS connection and one lookup per cycle
//! - **Credentials**: static token, signed request, service-account JWT, or token service client
//! - **Publisher**: a single authorized POST per data point
//! - **Exporter**: read, acquire, publish, then a fixed wait, forever
//!
//! ## Quick Start
//!
//! ```bash
//! KEY_NAME=sk-team YANDEX_FOLDER_ID=b1g... SA_KEY_FILE=key.json spendwatch
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod exporter;
pub mod models;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::auth::{build_provider, CredentialProvider};
    pub use crate::config::Config;
    pub use crate::db::SpendReader;
    pub use crate::error::{Error, Result};
    pub use crate::exporter::{CycleOutcome, Exporter, IntervalScheduler, MetricPublisher, Scheduler};
    pub use crate::models::*;
}
