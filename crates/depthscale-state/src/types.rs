//! Persisted records that are not shared domain types.

use serde::{Deserialize, Serialize};

use depthscale_core::{PoolName, PoolState};

/// Last committed capacity of an autoscaled pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoolRecord {
    pub name: PoolName,
    pub current_capacity: u32,
    pub min_capacity: u32,
    pub max_capacity: u32,
    /// Unix timestamp (milliseconds) of the last committed change.
    pub updated_at: u64,
}

impl PoolRecord {
    pub fn state(&self) -> PoolState {
        PoolState::new(self.current_capacity)
    }
}
