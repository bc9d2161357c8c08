//! depthscale-metrics: the metric channel between proxy and autoscaler.
//!
//! The proxy publishes one queue-depth sample per cache read; pools may
//! publish their own utilization. The autoscaler reads back only the most
//! recent sample of the series it is configured for, and can subscribe to
//! publish notifications to evaluate as soon as a sample lands.
//!
//! # Architecture
//!
//! ```text
//! StoreChannel
//!   ├── publish(namespace, data) → stamps, persists to StateStore, notifies
//!   ├── latest(namespace, name)  ← Autoscaler
//!   └── subscribe()              → watch::Receiver<u64> (publish count)
//!
//! InvocationCounters
//!   └── record(outcome) ← called per proxy invocation
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics endpoint
//! ```

pub mod channel;
pub mod collector;
pub mod prometheus;

pub use channel::{ChannelError, MetricChannel, StoreChannel};
pub use collector::{InvocationCounters, InvocationOutcome};
pub use prometheus::render_prometheus;
