//! The cache proxy.
//!
//! One invocation is: validate, acquire a cache connection, run the command,
//! release the connection, and for reads publish the value as a queue-depth
//! sample. Invocations share nothing but the settings and the connector.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use depthscale_cache::{CacheConnector, ConnectionGuard};
use depthscale_core::config::{MetricConfig, SetFieldCheck};
use depthscale_core::{DepthscaleConfig, Dimensions, MetricDatum, MetricUnit};
use depthscale_metrics::{InvocationCounters, InvocationOutcome, MetricChannel};

use crate::error::ProxyError;
use crate::request::{Command, InvokeRequest};
use crate::response::ProxyResponse;

/// Immutable per-proxy settings.
#[derive(Debug, Clone, Default)]
pub struct ProxySettings {
    pub metric: MetricConfig,
    pub set_fields: SetFieldCheck,
}

impl ProxySettings {
    pub fn from_config(config: &DepthscaleConfig) -> Self {
        Self {
            metric: config.metric.clone(),
            set_fields: config.proxy.set_fields,
        }
    }
}

pub struct CacheProxy {
    connector: Arc<dyn CacheConnector>,
    channel: Arc<dyn MetricChannel>,
    settings: ProxySettings,
    counters: InvocationCounters,
}

impl CacheProxy {
    pub fn new(
        connector: Arc<dyn CacheConnector>,
        channel: Arc<dyn MetricChannel>,
        settings: ProxySettings,
    ) -> Self {
        Self {
            connector,
            channel,
            settings,
            counters: InvocationCounters::new(),
        }
    }

    pub fn counters(&self) -> &InvocationCounters {
        &self.counters
    }

    pub fn settings(&self) -> &ProxySettings {
        &self.settings
    }

    /// Handle one invocation event.
    pub async fn handle(&self, event: &Value) -> ProxyResponse {
        match self.execute(event).await {
            Ok((outcome, message)) => {
                self.counters.record(outcome);
                ProxyResponse::ok(message)
            }
            Err(e @ ProxyError::NonNumericMetricValue { .. }) => {
                warn!(error = %e, "queue depth not published");
                self.counters.record(InvocationOutcome::Get);
                self.counters.record_non_numeric();
                ProxyResponse::from(&e)
            }
            Err(e) if e.is_validation() => {
                debug!(error = %e, "invocation rejected");
                self.counters.record(InvocationOutcome::Rejected);
                ProxyResponse::from(&e)
            }
            Err(e) => {
                error!(error = %e, cache = %self.connector.target(), "invocation failed");
                self.counters.record(InvocationOutcome::Failed);
                ProxyResponse::from(&e)
            }
        }
    }

    async fn execute(&self, event: &Value) -> Result<(InvocationOutcome, String), ProxyError> {
        let command = InvokeRequest::from_event(event).into_command(self.settings.set_fields)?;

        let mut conn = ConnectionGuard::acquire(self.connector.as_ref()).await?;
        match command {
            Command::Set(entry) => {
                conn.set(&entry.key, &entry.value).await?;
                conn.release();
                debug!(key = %entry.key, "cache value set");
                Ok((InvocationOutcome::Set, "ok.".to_string()))
            }
            Command::Get { key } => {
                let value = conn.get(&key).await?;
                conn.release();
                let message = format!(
                    "Cache value for key '{key}' is '{}'",
                    value.as_deref().unwrap_or("null")
                );
                debug!(%key, value = ?value, "cache value read");

                self.publish_depth(&key, value.as_deref()).await?;
                Ok((InvocationOutcome::Get, message))
            }
        }
    }

    /// Publish the value read for `key` as one queue-depth sample.
    async fn publish_depth(&self, key: &str, value: Option<&str>) -> Result<(), ProxyError> {
        let depth = numeric_value(value).ok_or_else(|| ProxyError::NonNumericMetricValue {
            key: key.to_string(),
            value: value.unwrap_or_default().to_string(),
        })?;

        let metric = &self.settings.metric;
        let mut dimensions = Dimensions::new();
        dimensions.insert(metric.dimension.clone(), metric.dimension_value.clone());
        let datum = MetricDatum {
            name: metric.name.clone(),
            dimensions,
            value: depth,
            unit: MetricUnit::Count,
        };

        self.channel.publish(&metric.namespace, vec![datum]).await?;
        debug!(namespace = %metric.namespace, name = %metric.name, value = depth, "queue depth published");
        Ok(())
    }
}

/// Queue depth carried by a cache value.
///
/// An absent or blank value is an empty queue. Anything else must be a
/// finite number after trimming.
pub fn numeric_value(value: Option<&str>) -> Option<f64> {
    let text = value.unwrap_or_default().trim();
    if text.is_empty() {
        return Some(0.0);
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}
