//! depthscale-cache: client side of the shared key/value cache.
//!
//! The proxy never holds a long-lived client. It asks a [`CacheConnector`]
//! for a fresh connection per invocation and wraps it in a
//! [`ConnectionGuard`], which closes the connection when dropped, on every
//! exit path.
//!
//! # Architecture
//!
//! ```text
//! connector_from_url("redis://host:6379/0")
//!   ├── RedisConnector  → TCP + RESP2 (AUTH / SELECT on connect)
//!   └── MemoryCache     → shared HashMap (memory://, tests)
//!
//! ConnectionGuard::acquire(&connector)
//!   ├── get(key) / set(key, value)   each bounded by command_timeout
//!   └── Drop → close()
//! ```

pub mod connection;
pub mod error;
pub mod memory;
pub mod redis;
pub mod resp;
pub mod target;

use std::sync::Arc;
use std::time::Duration;

pub use connection::{CacheConnection, CacheConnector, ConnectionGuard};
pub use error::{CacheError, CacheResult};
pub use memory::{ConnectionStats, MemoryCache};
pub use redis::RedisConnector;
pub use target::{CacheTarget, RedisTarget};

/// Build a connector for a cache URL.
pub fn connector_from_url(
    url: &str,
    connect_timeout: Duration,
    command_timeout: Duration,
) -> CacheResult<Arc<dyn CacheConnector>> {
    match CacheTarget::parse(url)? {
        CacheTarget::Redis(target) => Ok(Arc::new(RedisConnector::new(
            target,
            connect_timeout,
            command_timeout,
        ))),
        CacheTarget::Memory => Ok(Arc::new(MemoryCache::new())),
    }
}
