//! Metric data models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Label under which the key name is published
pub const KEY_LABEL: &str = "token";

/// One data point written to the monitoring backend.
///
/// Built fresh for every publish and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricPoint {
    /// Metric name
    pub name: String,

    /// Label set, containing exactly the key name
    pub labels: BTreeMap<String, String>,

    /// Spend value
    pub value: f64,

    /// Publish time
    #[serde(serialize_with = "serialize_ts")]
    pub ts: DateTime<Utc>,
}

impl MetricPoint {
    /// Create a point for the spend of `key_name` stamped with `ts`
    pub fn spend(name: &str, key_name: &str, value: f64, ts: DateTime<Utc>) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(KEY_LABEL.to_string(), key_name.to_string());

        Self {
            name: name.to_string(),
            labels,
            value,
            ts,
        }
    }
}

/// Body of a metrics write call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteRequest {
    /// Points to write; always a single element here
    pub metrics: Vec<MetricPoint>,
}

impl WriteRequest {
    /// Wrap a single point
    pub fn single(point: MetricPoint) -> Self {
        Self {
            metrics: vec![point],
        }
    }
}

/// ISO-8601 in UTC with a trailing `Z`
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn serialize_ts<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_ts(ts))
}
