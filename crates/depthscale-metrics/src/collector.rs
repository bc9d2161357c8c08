//! Invocation counters for proxy outcomes since process start.
//!
//! Lock-free: one atomic per outcome.

use std::sync::atomic::{AtomicU64, Ordering};

/// How a single proxy invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationOutcome {
    Set,
    Get,
    /// Rejected before touching the cache (401).
    Rejected,
    /// Cache or metric channel failure (5xx).
    Failed,
}

impl InvocationOutcome {
    pub const ALL: [InvocationOutcome; 4] = [
        InvocationOutcome::Set,
        InvocationOutcome::Get,
        InvocationOutcome::Rejected,
        InvocationOutcome::Failed,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            InvocationOutcome::Set => "set",
            InvocationOutcome::Get => "get",
            InvocationOutcome::Rejected => "rejected",
            InvocationOutcome::Failed => "failed",
        }
    }

    fn index(&self) -> usize {
        match self {
            InvocationOutcome::Set => 0,
            InvocationOutcome::Get => 1,
            InvocationOutcome::Rejected => 2,
            InvocationOutcome::Failed => 3,
        }
    }
}

/// Per-outcome invocation totals.
#[derive(Debug, Default)]
pub struct InvocationCounters {
    counts: [AtomicU64; 4],
    /// Reads whose value could not be turned into a sample.
    non_numeric: AtomicU64,
}

impl InvocationCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: InvocationOutcome) {
        self.counts[outcome.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_non_numeric(&self) {
        self.non_numeric.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self, outcome: InvocationOutcome) -> u64 {
        self.counts[outcome.index()].load(Ordering::Relaxed)
    }

    pub fn non_numeric(&self) -> u64 {
        self.non_numeric.load(Ordering::Relaxed)
    }

    /// `(label, count)` for every outcome, in a stable order.
    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        InvocationOutcome::ALL
            .iter()
            .map(|o| (o.label(), self.count(*o)))
            .collect()
    }
}
