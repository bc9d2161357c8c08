//! Autoscaler: one pool, one policy, one metric series.
//!
//! Reads the latest sample of the configured series from the metric
//! channel, plans a capacity through the pool's scaling policy, and resizes
//! the pool. Ticks are serialized per pool by an async mutex held across
//! evaluate, resize, and commit.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use depthscale_core::{MetricSample, PoolState, ScalingPolicy, epoch_millis};
use depthscale_metrics::{ChannelError, MetricChannel};
use depthscale_state::{PoolRecord, StateError, StateStore};

use crate::evaluate::evaluate;
use crate::pool::WorkerPool;

/// A scaling decision for a single pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Resize to the specified capacity.
    ScaleTo(u32),
    /// No change needed.
    NoChange,
}

/// What woke the autoscaler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The fixed evaluation interval elapsed.
    Interval,
    /// The metric channel reported a publish.
    Sample,
}

#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("resize of pool {pool} to {capacity} failed: {reason}")]
    Resize {
        pool: String,
        capacity: u32,
        reason: String,
    },

    #[error("metric channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("state error: {0}")]
    State(#[from] StateError),
}

/// Decide the capacity for `value` given the pool's current state.
pub fn plan(value: f64, policy: &ScalingPolicy, state: PoolState) -> ScaleDecision {
    let delta = evaluate(value, policy);
    let desired = policy.clamp_capacity(state.current_capacity, delta);
    if desired == state.current_capacity {
        ScaleDecision::NoChange
    } else {
        ScaleDecision::ScaleTo(desired)
    }
}

struct Inner {
    state: PoolState,
    /// `(timestamp_ms, sequence)` of the newest sample already evaluated.
    last_sample: Option<(u64, u64)>,
}

/// Sizes one worker pool from one metric series.
pub struct Autoscaler {
    policy: ScalingPolicy,
    namespace: String,
    metric: String,
    pool: Arc<dyn WorkerPool>,
    channel: Arc<dyn MetricChannel>,
    store: Option<StateStore>,
    inner: Mutex<Inner>,
    samples: watch::Receiver<u64>,
}

impl Autoscaler {
    /// Create an autoscaler for `pool`, reading `namespace/metric`.
    ///
    /// `initial_capacity` is clamped into the policy's bounds.
    pub fn new(
        policy: ScalingPolicy,
        series: (String, String),
        initial_capacity: u32,
        pool: Arc<dyn WorkerPool>,
        channel: Arc<dyn MetricChannel>,
    ) -> Self {
        let clamped = policy.clamp_capacity(initial_capacity, 0);
        if clamped != initial_capacity {
            warn!(
                pool = %pool.name(),
                initial_capacity,
                clamped,
                "initial capacity outside policy bounds, clamped"
            );
        }
        let (namespace, metric) = series;
        let samples = channel.subscribe();
        Self {
            policy,
            namespace,
            metric,
            pool,
            channel,
            store: None,
            inner: Mutex::new(Inner {
                state: PoolState::new(clamped),
                last_sample: None,
            }),
            samples,
        }
    }

    /// Persist a pool record after every committed resize.
    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn name(&self) -> &str {
        self.pool.name()
    }

    pub fn policy(&self) -> &ScalingPolicy {
        &self.policy
    }

    /// The `(namespace, name)` series this autoscaler follows.
    pub fn series(&self) -> (&str, &str) {
        (&self.namespace, &self.metric)
    }

    pub async fn state(&self) -> PoolState {
        self.inner.lock().await.state
    }

    /// Evaluate one sample and apply the result to the pool.
    ///
    /// On resize failure the pool state is left unchanged and the error is
    /// returned.
    pub async fn tick(&self, sample: &MetricSample) -> Result<PoolState, ScaleError> {
        let mut inner = self.inner.lock().await;
        let order = (sample.timestamp_ms, sample.sequence);
        inner.last_sample = Some(inner.last_sample.map_or(order, |seen| seen.max(order)));

        let current = inner.state;
        let target = match plan(sample.value, &self.policy, current) {
            ScaleDecision::NoChange => {
                debug!(
                    pool = %self.name(),
                    value = sample.value,
                    capacity = current.current_capacity,
                    "no scaling change"
                );
                return Ok(current);
            }
            ScaleDecision::ScaleTo(target) => target,
        };

        if let Err(e) = self.pool.resize(target).await {
            warn!(
                pool = %self.name(),
                from = current.current_capacity,
                to = target,
                error = %e,
                "scaling action failed"
            );
            return Err(ScaleError::Resize {
                pool: self.name().to_string(),
                capacity: target,
                reason: format!("{e:#}"),
            });
        }

        info!(
            pool = %self.name(),
            from = current.current_capacity,
            to = target,
            value = sample.value,
            series = %sample.series_key(),
            "pool resized"
        );
        inner.state = PoolState::new(target);
        self.persist(inner.state);
        Ok(inner.state)
    }

    /// Tick against the latest sample of the series.
    ///
    /// Returns `None` when there is nothing to evaluate: no sample yet, or,
    /// for a [`Trigger::Sample`] wakeup, no sample newer than the last one
    /// evaluated.
    pub async fn evaluate_latest(&self, trigger: Trigger) -> Result<Option<PoolState>, ScaleError> {
        let Some(sample) = self.channel.latest(&self.namespace, &self.metric).await? else {
            debug!(pool = %self.name(), series = %format!("{}/{}", self.namespace, self.metric), "no samples yet");
            return Ok(None);
        };

        if trigger == Trigger::Sample {
            let seen = self.inner.lock().await.last_sample;
            if seen.is_some_and(|seen| (sample.timestamp_ms, sample.sequence) <= seen) {
                return Ok(None);
            }
        }

        self.tick(&sample).await.map(Some)
    }

    /// Write the current state as a pool record.
    pub async fn record(&self) {
        let state = self.state().await;
        self.persist(state);
    }

    fn persist(&self, state: PoolState) {
        let Some(store) = &self.store else {
            return;
        };
        let record = PoolRecord {
            name: self.name().to_string(),
            current_capacity: state.current_capacity,
            min_capacity: self.policy.min_capacity,
            max_capacity: self.policy.max_capacity,
            updated_at: epoch_millis(),
        };
        if let Err(e) = store.put_pool(&record) {
            warn!(pool = %self.name(), error = %e, "failed to persist pool record");
        }
    }

    async fn evaluate_and_log(&self, trigger: Trigger) {
        if let Err(e) = self.evaluate_latest(trigger).await {
            tracing::error!(pool = %self.name(), ?trigger, error = %e, "autoscaler evaluation failed");
        }
    }

    /// Run the autoscaler loop until `shutdown` changes.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut samples = self.samples.clone();
        let mut notifications = true;
        self.record().await;

        info!(
            pool = %self.name(),
            series = %format!("{}/{}", self.namespace, self.metric),
            interval_secs = interval.as_secs(),
            "autoscaler started"
        );

        // One timer for the whole run, so publishes never push the next
        // interval evaluation back.
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.reset();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.evaluate_and_log(Trigger::Interval).await;
                }
                changed = samples.changed(), if notifications => {
                    if changed.is_err() {
                        warn!(pool = %self.name(), "metric channel closed, interval only");
                        notifications = false;
                        continue;
                    }
                    self.evaluate_and_log(Trigger::Sample).await;
                }
                _ = shutdown.changed() => {
                    info!(pool = %self.name(), "autoscaler shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DesiredCountPool;
    use depthscale_core::{Dimensions, MetricDatum, MetricUnit, ScalingStep};
    use depthscale_metrics::StoreChannel;

    const NS: &str = "redisQueueSizeNamespace";
    const NAME: &str = "redisQueueSize";

    fn queue_policy() -> ScalingPolicy {
        ScalingPolicy {
            min_capacity: 1,
            max_capacity: 10,
            steps: vec![
                ScalingStep::new(None, Some(10.0), -1),
                ScalingStep::new(Some(50.0), None, 1),
                ScalingStep::new(Some(70.0), None, 3),
            ],
            ..ScalingPolicy::default()
        }
    }

    fn sample(value: f64, timestamp_ms: u64) -> MetricSample {
        MetricSample {
            namespace: NS.to_string(),
            name: NAME.to_string(),
            dimensions: Dimensions::new(),
            value,
            unit: MetricUnit::Count,
            timestamp_ms,
            sequence: 0,
        }
    }

    fn datum(value: f64) -> MetricDatum {
        MetricDatum {
            name: NAME.to_string(),
            dimensions: Dimensions::new(),
            value,
            unit: MetricUnit::Count,
        }
    }

    struct Fixture {
        scaler: Arc<Autoscaler>,
        pool: Arc<DesiredCountPool>,
        channel: Arc<StoreChannel>,
        store: StateStore,
    }

    fn fixture(initial: u32) -> Fixture {
        let store = StateStore::open_in_memory().unwrap();
        let channel = Arc::new(StoreChannel::new(store.clone()));
        let pool = Arc::new(DesiredCountPool::new("workers", initial));
        let scaler = Autoscaler::new(
            queue_policy(),
            (NS.to_string(), NAME.to_string()),
            initial,
            pool.clone(),
            channel.clone(),
        )
        .with_store(store.clone());
        Fixture {
            scaler: Arc::new(scaler),
            pool,
            channel,
            store,
        }
    }

    #[test]
    fn plan_clamps_to_bounds() {
        let policy = queue_policy();
        assert_eq!(plan(5.0, &policy, PoolState::new(1)), ScaleDecision::NoChange);
        assert_eq!(plan(80.0, &policy, PoolState::new(9)), ScaleDecision::ScaleTo(10));
        assert_eq!(plan(80.0, &policy, PoolState::new(10)), ScaleDecision::NoChange);
        assert_eq!(plan(55.0, &policy, PoolState::new(2)), ScaleDecision::ScaleTo(3));
        assert_eq!(plan(30.0, &policy, PoolState::new(4)), ScaleDecision::NoChange);
    }

    #[tokio::test]
    async fn tick_scales_and_persists() {
        let f = fixture(2);
        let state = f.scaler.tick(&sample(80.0, 1)).await.unwrap();
        assert_eq!(state.current_capacity, 5);
        assert_eq!(f.pool.desired(), 5);

        let record = f.store.get_pool("workers").unwrap().unwrap();
        assert_eq!(record.current_capacity, 5);
        assert_eq!(record.max_capacity, 10);
    }

    #[tokio::test]
    async fn tick_at_minimum_does_not_resize() {
        let f = fixture(1);
        let state = f.scaler.tick(&sample(5.0, 1)).await.unwrap();
        assert_eq!(state.current_capacity, 1);
        assert_eq!(f.pool.resizes(), 0);
    }

    #[tokio::test]
    async fn repeated_out_of_range_ticks_are_stable() {
        let f = fixture(10);
        for ts in 0..5 {
            let state = f.scaler.tick(&sample(1_000.0, ts)).await.unwrap();
            assert_eq!(state.current_capacity, 10);
        }
        assert_eq!(f.pool.resizes(), 0);
    }

    #[tokio::test]
    async fn failed_resize_leaves_state_unchanged() {
        let f = fixture(2);
        f.scaler.tick(&sample(55.0, 1)).await.unwrap();
        f.pool.fail_resizes(true);

        let err = f.scaler.tick(&sample(80.0, 2)).await.unwrap_err();
        assert!(matches!(err, ScaleError::Resize { capacity: 6, .. }));
        assert_eq!(f.scaler.state().await.current_capacity, 3);
        assert_eq!(
            f.store.get_pool("workers").unwrap().unwrap().current_capacity,
            3
        );
    }

    #[tokio::test]
    async fn initial_capacity_is_clamped() {
        let f = fixture(25);
        assert_eq!(f.scaler.state().await.current_capacity, 10);
        let f = fixture(0);
        assert_eq!(f.scaler.state().await.current_capacity, 1);
    }

    #[tokio::test]
    async fn evaluate_latest_reads_channel() {
        let f = fixture(2);
        assert_eq!(f.scaler.evaluate_latest(Trigger::Interval).await.unwrap(), None);

        f.channel.publish(NS, vec![datum(75.0)]).await.unwrap();
        let state = f
            .scaler
            .evaluate_latest(Trigger::Interval)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.current_capacity, 5);

        // The same sample is not re-applied on a publish wakeup...
        assert_eq!(f.scaler.evaluate_latest(Trigger::Sample).await.unwrap(), None);
        // ...but the interval keeps scaling while the value stays high.
        let state = f
            .scaler
            .evaluate_latest(Trigger::Interval)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.current_capacity, 8);
    }

    #[tokio::test]
    async fn samples_in_same_millisecond_each_trigger() {
        let f = fixture(2);
        f.store.put_sample(&sample(55.0, 1000)).unwrap();
        let state = f.scaler.evaluate_latest(Trigger::Sample).await.unwrap();
        assert_eq!(state.map(|s| s.current_capacity), Some(3));

        f.store.put_sample(&sample(55.0, 1000)).unwrap();
        let state = f.scaler.evaluate_latest(Trigger::Sample).await.unwrap();
        assert_eq!(state.map(|s| s.current_capacity), Some(4));

        assert_eq!(f.scaler.evaluate_latest(Trigger::Sample).await.unwrap(), None);
    }

    #[tokio::test]
    async fn other_series_does_not_drive_pool() {
        let f = fixture(2);
        f.channel
            .publish(
                "other",
                vec![MetricDatum {
                    name: "cpu".to_string(),
                    dimensions: Dimensions::new(),
                    value: 99.0,
                    unit: MetricUnit::Percent,
                }],
            )
            .await
            .unwrap();
        assert_eq!(f.scaler.evaluate_latest(Trigger::Sample).await.unwrap(), None);
        assert_eq!(f.pool.resizes(), 0);
    }

    #[tokio::test]
    async fn interval_keeps_firing_under_unrelated_publishes() {
        let f = fixture(2);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let scaler = Arc::clone(&f.scaler);
        let handle = tokio::spawn(async move {
            scaler.run(Duration::from_millis(100), shutdown_rx).await;
        });

        // One high reading on the pool's own series, then silence on it.
        f.channel.publish(NS, vec![datum(75.0)]).await.unwrap();

        // Another series publishes well inside every interval.
        let noisy = Arc::clone(&f.channel);
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let publisher = tokio::spawn(async move {
            loop {
                let cpu = MetricDatum {
                    name: "cpu".to_string(),
                    dimensions: Dimensions::new(),
                    value: 10.0,
                    unit: MetricUnit::Percent,
                };
                noisy.publish("other", vec![cpu]).await.unwrap();
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(20)) => {}
                    _ = stop_rx.changed() => break,
                }
            }
        });

        tokio::time::timeout(Duration::from_secs(5), async {
            while f.pool.desired() != 10 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("interval evaluations starved by unrelated publishes");

        stop_tx.send(true).unwrap();
        publisher.await.unwrap();
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("autoscaler did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn run_reacts_to_publish_and_stops_on_shutdown() {
        let f = fixture(2);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let scaler = Arc::clone(&f.scaler);
        let handle = tokio::spawn(async move {
            scaler.run(Duration::from_secs(3600), shutdown_rx).await;
        });

        f.channel.publish(NS, vec![datum(60.0)]).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while f.pool.desired() != 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("autoscaler did not react to publish");

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("autoscaler did not stop")
            .unwrap();

        assert_eq!(f.store.list_pools().unwrap().len(), 1);
    }
}
