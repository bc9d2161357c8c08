//! Metric channel: publish and query timestamped samples.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use depthscale_core::{MetricDatum, MetricSample, epoch_millis};
use depthscale_state::{StateError, StateStore};

/// Samples retained per series by [`StoreChannel`].
pub const DEFAULT_RETENTION: usize = 1440;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("namespace must not be empty")]
    EmptyNamespace,

    #[error("metric name must not be empty")]
    EmptyName,

    #[error("metric {name} has non-finite value {value}")]
    NonFiniteValue { name: String, value: f64 },

    #[error("metric store error: {0}")]
    Store(#[from] StateError),
}

/// Receives samples and answers "what is the latest value of this series".
#[async_trait]
pub trait MetricChannel: Send + Sync {
    /// Stamp and record every datum under `namespace`. All or nothing on
    /// validation; returns the stamped samples.
    async fn publish(
        &self,
        namespace: &str,
        data: Vec<MetricDatum>,
    ) -> Result<Vec<MetricSample>, ChannelError>;

    /// Most recent sample of `namespace/name`.
    async fn latest(&self, namespace: &str, name: &str)
    -> Result<Option<MetricSample>, ChannelError>;

    /// Receiver bumped after every successful publish.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// Metric channel persisting to the local state store.
pub struct StoreChannel {
    store: StateStore,
    notify: watch::Sender<u64>,
    retention: usize,
}

impl StoreChannel {
    pub fn new(store: StateStore) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            store,
            notify,
            retention: DEFAULT_RETENTION,
        }
    }

    /// Number of samples kept per series.
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }
}

#[async_trait]
impl MetricChannel for StoreChannel {
    async fn publish(
        &self,
        namespace: &str,
        data: Vec<MetricDatum>,
    ) -> Result<Vec<MetricSample>, ChannelError> {
        if namespace.trim().is_empty() {
            return Err(ChannelError::EmptyNamespace);
        }
        for datum in &data {
            if datum.name.trim().is_empty() {
                return Err(ChannelError::EmptyName);
            }
            if !datum.value.is_finite() {
                return Err(ChannelError::NonFiniteValue {
                    name: datum.name.clone(),
                    value: datum.value,
                });
            }
        }

        let now = epoch_millis();
        let mut samples = Vec::with_capacity(data.len());
        for datum in data {
            let sample = self
                .store
                .put_sample(&MetricSample::from_datum(namespace, datum, now))?;
            self.store
                .prune_samples(&sample.namespace, &sample.name, self.retention)?;
            debug!(
                series = %sample.series_key(),
                value = sample.value,
                unit = %sample.unit,
                "sample published"
            );
            samples.push(sample);
        }

        if !samples.is_empty() {
            self.notify.send_modify(|n| *n += 1);
        }
        Ok(samples)
    }

    async fn latest(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<MetricSample>, ChannelError> {
        Ok(self.store.latest_sample(namespace, name)?)
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depthscale_core::{Dimensions, MetricUnit};

    fn datum(name: &str, value: f64) -> MetricDatum {
        MetricDatum {
            name: name.to_string(),
            dimensions: Dimensions::new(),
            value,
            unit: MetricUnit::Count,
        }
    }

    fn channel() -> StoreChannel {
        StoreChannel::new(StateStore::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn publish_then_latest() {
        let channel = channel();
        channel
            .publish("queue", vec![datum("depth", 3.0)])
            .await
            .unwrap();
        let published = channel
            .publish("queue", vec![datum("depth", 8.0)])
            .await
            .unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].namespace, "queue");

        let latest = channel.latest("queue", "depth").await.unwrap().unwrap();
        assert_eq!(latest.value, 8.0);
        assert_eq!(latest.sequence, published[0].sequence);
        assert!(channel.latest("queue", "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn publish_rejects_invalid_batch_entirely() {
        let channel = channel();
        let err = channel
            .publish("queue", vec![datum("depth", 1.0), datum("depth", f64::NAN)])
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::NonFiniteValue { .. }));
        assert!(channel.latest("queue", "depth").await.unwrap().is_none());

        assert!(matches!(
            channel.publish(" ", vec![datum("depth", 1.0)]).await,
            Err(ChannelError::EmptyNamespace)
        ));
        assert!(matches!(
            channel.publish("queue", vec![datum("", 1.0)]).await,
            Err(ChannelError::EmptyName)
        ));
    }

    #[tokio::test]
    async fn subscribers_see_publishes() {
        let channel = channel();
        let mut rx = channel.subscribe();
        assert_eq!(*rx.borrow_and_update(), 0);

        channel
            .publish("queue", vec![datum("depth", 1.0)])
            .await
            .unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), 1);

        // An empty batch is not a publish.
        channel.publish("queue", vec![]).await.unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn retention_bounds_series() {
        let channel = channel().with_retention(3);
        for i in 0..10 {
            channel
                .publish("queue", vec![datum("depth", i as f64)])
                .await
                .unwrap();
        }
        let kept = channel.store().list_samples("queue", "depth", 100).unwrap();
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].value, 9.0);
    }
}
