//! Worker pools: the resizable fleet an autoscaler controls.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

/// A fleet of stateless executors whose size can be set.
#[async_trait]
pub trait WorkerPool: Send + Sync {
    fn name(&self) -> &str;

    /// Ask the pool to run `capacity` workers.
    async fn resize(&self, capacity: u32) -> anyhow::Result<()>;
}

/// Pool that records its desired count in process.
///
/// The daemon's default pool: the committed count is exposed through the
/// API for an external orchestrator to act on.
#[derive(Debug)]
pub struct DesiredCountPool {
    name: String,
    desired: AtomicU32,
    resizes: AtomicU64,
    fail: AtomicBool,
}

impl DesiredCountPool {
    pub fn new(name: impl Into<String>, desired: u32) -> Self {
        Self {
            name: name.into(),
            desired: AtomicU32::new(desired),
            resizes: AtomicU64::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn desired(&self) -> u32 {
        self.desired.load(Ordering::SeqCst)
    }

    /// Successful resize calls so far.
    pub fn resizes(&self) -> u64 {
        self.resizes.load(Ordering::SeqCst)
    }

    /// Make subsequent resizes fail.
    pub fn fail_resizes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl WorkerPool for DesiredCountPool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resize(&self, capacity: u32) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("pool {} rejected resize to {capacity}", self.name);
        }
        let previous = self.desired.swap(capacity, Ordering::SeqCst);
        self.resizes.fetch_add(1, Ordering::SeqCst);
        info!(pool = %self.name, from = previous, to = capacity, "desired count updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn desired_count_pool_records_resizes() {
        let pool = DesiredCountPool::new("workers", 2);
        pool.resize(5).await.unwrap();
        assert_eq!(pool.desired(), 5);
        assert_eq!(pool.resizes(), 1);

        pool.fail_resizes(true);
        assert!(pool.resize(7).await.is_err());
        assert_eq!(pool.desired(), 5);
        assert_eq!(pool.resizes(), 1);
    }
}
