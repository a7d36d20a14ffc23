//! Data models for SpendWatch

mod credential;
mod key;
mod metrics;

pub use credential::*;
pub use key::*;
pub use metrics::*;
