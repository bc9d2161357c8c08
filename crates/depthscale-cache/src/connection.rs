//! Connection traits and the scoped connection guard.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{CacheError, CacheResult};

/// One open connection to the shared cache.
#[async_trait]
pub trait CacheConnection: Send {
    /// Read the value stored under `key`.
    async fn get(&mut self, key: &str) -> CacheResult<Option<String>>;
    /// Store `value` under `key`.
    async fn set(&mut self, key: &str, value: &str) -> CacheResult<()>;
    /// Close the underlying transport. Must be idempotent.
    fn close(&mut self);
}

/// Opens connections to the shared cache; injected so tests can swap backends.
#[async_trait]
pub trait CacheConnector: Send + Sync {
    async fn connect(&self) -> CacheResult<Box<dyn CacheConnection>>;
    /// Human-readable target, safe to log.
    fn target(&self) -> String;
}

/// A connection scoped to one invocation.
///
/// Closed on drop, so every exit path (early return, `?`, panic) releases it.
pub struct ConnectionGuard {
    conn: Option<Box<dyn CacheConnection>>,
    target: String,
}

impl ConnectionGuard {
    /// Open a connection through `connector`.
    pub async fn acquire(connector: &dyn CacheConnector) -> CacheResult<Self> {
        let target = connector.target();
        let conn = connector.connect().await?;
        debug!(cache = %target, "cache connection acquired");
        Ok(Self {
            conn: Some(conn),
            target,
        })
    }

    pub async fn get(&mut self, key: &str) -> CacheResult<Option<String>> {
        self.conn.as_mut().ok_or(CacheError::Closed)?.get(key).await
    }

    pub async fn set(&mut self, key: &str, value: &str) -> CacheResult<()> {
        self.conn.as_mut().ok_or(CacheError::Closed)?.set(key, value).await
    }

    /// Close now instead of at end of scope.
    pub fn release(mut self) {
        self.close_inner();
    }

    fn close_inner(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close();
            debug!(cache = %self.target, "cache connection released");
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.close_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCache;

    #[tokio::test]
    async fn guard_closes_on_drop() {
        let cache = MemoryCache::new();
        {
            let mut guard = ConnectionGuard::acquire(&cache).await.unwrap();
            guard.set("queue", "3").await.unwrap();
            assert_eq!(cache.stats().open(), 1);
        }
        let stats = cache.stats();
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.closed, 1);
    }

    #[tokio::test]
    async fn guard_closes_on_early_error() {
        let cache = MemoryCache::new();

        async fn failing(cache: &MemoryCache) -> CacheResult<()> {
            let mut guard = ConnectionGuard::acquire(cache).await?;
            cache.fail_commands(true);
            guard.get("queue").await?;
            unreachable!("get should fail");
        }

        assert!(failing(&cache).await.is_err());
        assert_eq!(cache.stats().open(), 0);
    }

    #[tokio::test]
    async fn explicit_release_closes_once() {
        let cache = MemoryCache::new();
        let guard = ConnectionGuard::acquire(&cache).await.unwrap();
        guard.release();
        let stats = cache.stats();
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.closed, 1);
    }

    #[tokio::test]
    async fn failed_connect_opens_nothing() {
        let cache = MemoryCache::new();
        cache.fail_connect(true);
        assert!(ConnectionGuard::acquire(&cache).await.is_err());
        assert_eq!(cache.stats().opened, 0);
    }
}
