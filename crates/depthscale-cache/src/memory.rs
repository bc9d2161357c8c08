//! Process-local cache backend.
//!
//! Every connection shares one map, so writes through one connection are
//! visible to reads through the next. Tracks opened/closed connections and
//! supports failure injection for tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::connection::{CacheConnection, CacheConnector};
use crate::error::{CacheError, CacheResult};

#[derive(Default)]
struct Shared {
    entries: RwLock<HashMap<String, String>>,
    opened: AtomicU64,
    closed: AtomicU64,
    fail_connect: AtomicBool,
    fail_commands: AtomicBool,
}

/// Connection counters for a [`MemoryCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    pub opened: u64,
    pub closed: u64,
}

impl ConnectionStats {
    /// Connections opened and not yet closed.
    pub fn open(&self) -> u64 {
        self.opened.saturating_sub(self.closed)
    }
}

/// In-memory cache; cloning shares the same entries.
#[derive(Clone, Default)]
pub struct MemoryCache {
    shared: Arc<Shared>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            opened: self.shared.opened.load(Ordering::SeqCst),
            closed: self.shared.closed.load(Ordering::SeqCst),
        }
    }

    /// Make subsequent `connect()` calls fail.
    pub fn fail_connect(&self, fail: bool) {
        self.shared.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `get`/`set` calls fail.
    pub fn fail_commands(&self, fail: bool) {
        self.shared.fail_commands.store(fail, Ordering::SeqCst);
    }

    /// Read an entry without opening a connection.
    pub async fn peek(&self, key: &str) -> Option<String> {
        self.shared.entries.read().await.get(key).cloned()
    }
}

#[async_trait]
impl CacheConnector for MemoryCache {
    async fn connect(&self) -> CacheResult<Box<dyn CacheConnection>> {
        if self.shared.fail_connect.load(Ordering::SeqCst) {
            return Err(CacheError::Connect {
                target: self.target(),
                reason: "connection refused".to_string(),
            });
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            open: true,
        }))
    }

    fn target(&self) -> String {
        "memory://".to_string()
    }
}

struct MemoryConnection {
    shared: Arc<Shared>,
    open: bool,
}

impl MemoryConnection {
    fn check(&self) -> CacheResult<()> {
        if !self.open {
            return Err(CacheError::Closed);
        }
        if self.shared.fail_commands.load(Ordering::SeqCst) {
            return Err(CacheError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "injected failure",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheConnection for MemoryConnection {
    async fn get(&mut self, key: &str) -> CacheResult<Option<String>> {
        self.check()?;
        Ok(self.shared.entries.read().await.get(key).cloned())
    }

    async fn set(&mut self, key: &str, value: &str) -> CacheResult<()> {
        self.check()?;
        self.shared
            .entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.shared.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.close();
    }
}
