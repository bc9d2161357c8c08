//! redb table definitions for the depthscale store.

use redb::TableDefinition;

/// Sample key. Tuple ordering keeps each series contiguous and time-ordered.
pub type SampleKey<'a> = (&'a str, &'a str, u64, u64);

/// Metric samples keyed by `(namespace, name, timestamp_ms, sequence)`.
pub const SAMPLES: TableDefinition<SampleKey<'static>, &[u8]> =
    TableDefinition::new("metric_samples");

/// Pool records keyed by pool name.
pub const POOLS: TableDefinition<&str, &[u8]> = TableDefinition::new("pools");
