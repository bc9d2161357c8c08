//! depthscale-autoscale: metric-driven worker pool scaling.
//!
//! Reads the latest sample of a configured series from the metric channel,
//! maps it to a capacity change through the pool's step-scaling policy, and
//! resizes the pool within its bounds.
//!
//! # Scaling Algorithm
//!
//! ```text
//! value = latest sample of (namespace, name)
//! delta = change of the first step with lower <= value < upper, else 0
//! new   = clamp(current + delta, min_capacity, max_capacity)
//!
//! if new != current:
//!     pool.resize(new)   // on failure the pool state is left as is
//! ```
//!
//! An open-ended step (`upper` absent) ends where the next step begins when
//! that step starts higher, so `[{upper: 10}, {lower: 50}, {lower: 70}]`
//! reads as `(-inf, 10)`, `[50, 70)`, `[70, +inf)`.
//!
//! The loop wakes on a fixed interval and whenever the metric channel
//! reports a new publish.

pub mod evaluate;
pub mod pool;
pub mod scaler;

pub use evaluate::{evaluate, normalized_steps};
pub use pool::{DesiredCountPool, WorkerPool};
pub use scaler::{Autoscaler, ScaleDecision, ScaleError, Trigger, plan};
