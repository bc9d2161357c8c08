//! depthscale-state: embedded store for depthscale.
//!
//! Backed by [redb](https://docs.rs/redb), keeps the metric samples
//! published to the local metric channel and the last committed capacity
//! of every autoscaled pool.
//!
//! # Architecture
//!
//! Values are JSON-serialized into redb's `&[u8]` value columns. Sample keys
//! are `{namespace}/{name}:{timestamp_ms}:{seq}` with zero-padded numbers,
//! so a reverse range scan over one series yields the newest sample first.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
