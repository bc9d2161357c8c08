//! Shared types used across depthscale crates.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Name of a worker pool controlled by an autoscaler.
pub type PoolName = String;

/// Dimension name → value pairs attached to a metric.
pub type Dimensions = BTreeMap<String, String>;

// ── Cache ─────────────────────────────────────────────────────────

/// A single key/value pair held by the shared cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
}

// ── Metrics ───────────────────────────────────────────────────────

/// Unit attached to a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MetricUnit {
    #[default]
    Count,
    Percent,
    Seconds,
    Milliseconds,
    Bytes,
    None,
}

impl MetricUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricUnit::Count => "Count",
            MetricUnit::Percent => "Percent",
            MetricUnit::Seconds => "Seconds",
            MetricUnit::Milliseconds => "Milliseconds",
            MetricUnit::Bytes => "Bytes",
            MetricUnit::None => "None",
        }
    }
}

impl fmt::Display for MetricUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation as handed to a metric channel, before it is stamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDatum {
    pub name: String,
    #[serde(default)]
    pub dimensions: Dimensions,
    pub value: f64,
    #[serde(default)]
    pub unit: MetricUnit,
}

/// A timestamped, named, dimensioned numeric observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub namespace: String,
    pub name: String,
    pub dimensions: Dimensions,
    pub value: f64,
    pub unit: MetricUnit,
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// Store-assigned publish order. Zero until the sample is recorded.
    #[serde(default)]
    pub sequence: u64,
}

impl MetricSample {
    /// Stamp a datum published under `namespace`.
    pub fn from_datum(namespace: &str, datum: MetricDatum, timestamp_ms: u64) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: datum.name,
            dimensions: datum.dimensions,
            value: datum.value,
            unit: datum.unit,
            timestamp_ms,
            sequence: 0,
        }
    }

    /// Display name of the series this sample belongs to.
    ///
    /// Not an identity: namespaces and names may themselves contain `/`.
    pub fn series_key(&self) -> String {
        series_key(&self.namespace, &self.name)
    }
}

/// Build the `{namespace}/{name}` label used when logging a series.
pub fn series_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

// ── Pool ──────────────────────────────────────────────────────────

/// Size of a worker pool as last committed by its autoscaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub current_capacity: u32,
}

impl PoolState {
    pub fn new(current_capacity: u32) -> Self {
        Self { current_capacity }
    }
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
