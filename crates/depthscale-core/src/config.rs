//! depthscale.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policy::ScalingPolicy;
use crate::types::PoolName;

/// Environment variable overriding `[cache] url`.
pub const CACHE_URL_ENV: &str = "CACHE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepthscaleConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub metric: MetricConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub autoscaler: AutoscalerConfig,
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// `redis://...` or `memory://`.
    pub url: String,
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connect_timeout_ms: 1000,
            command_timeout_ms: 3000,
        }
    }
}

impl CacheConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Identity of the queue-depth metric emitted on every cache read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    pub namespace: String,
    pub name: String,
    /// Dimension name attached to each sample.
    pub dimension: String,
    /// Dimension value attached to each sample.
    pub dimension_value: String,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            namespace: "redisQueueSizeNamespace".to_string(),
            name: "redisQueueSize".to_string(),
            dimension: "redisQueueSize".to_string(),
            dimension_value: "The length of the queue".to_string(),
        }
    }
}

/// Which missing fields make a `set` request invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetFieldCheck {
    /// Reject only when both `key` and `value` are missing.
    #[default]
    Both,
    /// Reject when either `key` or `value` is missing.
    Either,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub set_fields: SetFieldCheck,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscalerConfig {
    pub interval_secs: u64,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl AutoscalerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Where a pool's scaling signal comes from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricSourceConfig {
    /// The queue-depth series configured under `[metric]`.
    #[default]
    QueueDepth,
    /// Any other published series, e.g. a pool's own utilization.
    Metric { namespace: String, name: String },
}

impl MetricSourceConfig {
    /// Resolve to the `(namespace, name)` series to read.
    pub fn series(&self, metric: &MetricConfig) -> (String, String) {
        match self {
            MetricSourceConfig::QueueDepth => (metric.namespace.clone(), metric.name.clone()),
            MetricSourceConfig::Metric { namespace, name } => (namespace.clone(), name.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub name: PoolName,
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: u32,
    #[serde(default)]
    pub source: MetricSourceConfig,
    #[serde(default)]
    pub policy: ScalingPolicy,
}

fn default_initial_capacity() -> u32 {
    2
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "workers".to_string(),
            initial_capacity: default_initial_capacity(),
            source: MetricSourceConfig::default(),
            policy: ScalingPolicy::default(),
        }
    }
}

impl DepthscaleConfig {
    /// Load, apply environment overrides, and validate.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(std::env::var(CACHE_URL_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let mut config: DepthscaleConfig = toml::from_str(content)?;
        if config.pools.is_empty() {
            config.pools.push(PoolConfig::default());
        }
        Ok(config)
    }

    /// Built-in defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self {
            pools: vec![PoolConfig::default()],
            ..Self::default()
        };
        config.apply_overrides(std::env::var(CACHE_URL_ENV).ok());
        config
    }

    pub fn apply_overrides(&mut self, cache_url: Option<String>) {
        if let Some(url) = cache_url.filter(|u| !u.trim().is_empty()) {
            self.cache.url = url;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.autoscaler.interval_secs == 0 {
            anyhow::bail!("autoscaler.interval_secs must be greater than zero");
        }
        let mut seen = std::collections::HashSet::new();
        for pool in &self.pools {
            if !seen.insert(pool.name.as_str()) {
                anyhow::bail!("duplicate pool name: {}", pool.name);
            }
            pool.policy
                .validate()
                .map_err(|e| anyhow::anyhow!("pool {}: {e}", pool.name))?;
        }
        Ok(())
    }

    pub fn pool(&self, name: &str) -> Option<&PoolConfig> {
        self.pools.iter().find(|p| p.name == name)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = DepthscaleConfig::from_toml_str("").unwrap();
        assert_eq!(config.cache.url, "redis://127.0.0.1:6379");
        assert_eq!(config.metric.namespace, "redisQueueSizeNamespace");
        assert_eq!(config.metric.name, "redisQueueSize");
        assert_eq!(config.proxy.set_fields, SetFieldCheck::Both);
        assert_eq!(config.pools.len(), 1);
        assert_eq!(config.pools[0].initial_capacity, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
[cache]
url = "redis://cache.internal:6380/2"
command_timeout_ms = 500

[metric]
namespace = "jobs"
name = "backlog"

[proxy]
set_fields = "either"

[autoscaler]
interval_secs = 15

[[pools]]
name = "queue-workers"
initial_capacity = 3

[pools.policy]
min_capacity = 2
max_capacity = 20
steps = [ { upper = 5, change = -1 }, { lower = 100, change = 4 } ]

[[pools]]
name = "web"
source = { kind = "metric", namespace = "depthscale/pool", name = "CPUUtilization" }
"#;
        let config = DepthscaleConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.cache.url, "redis://cache.internal:6380/2");
        assert_eq!(config.cache.connect_timeout_ms, 1000);
        assert_eq!(config.cache.command_timeout(), Duration::from_millis(500));
        assert_eq!(config.proxy.set_fields, SetFieldCheck::Either);
        assert_eq!(config.autoscaler.interval(), Duration::from_secs(15));

        let workers = config.pool("queue-workers").unwrap();
        assert_eq!(workers.source, MetricSourceConfig::QueueDepth);
        assert_eq!(
            workers.source.series(&config.metric),
            ("jobs".to_string(), "backlog".to_string())
        );
        assert_eq!(workers.policy.max_capacity, 20);

        let web = config.pool("web").unwrap();
        assert_eq!(web.initial_capacity, 2);
        assert_eq!(
            web.source.series(&config.metric),
            ("depthscale/pool".to_string(), "CPUUtilization".to_string())
        );
        assert_eq!(web.policy, ScalingPolicy::default());
    }

    #[test]
    fn test_cache_url_override() {
        let mut config = DepthscaleConfig::from_toml_str("").unwrap();
        config.apply_overrides(Some("redis://10.0.0.5:6379".to_string()));
        assert_eq!(config.cache.url, "redis://10.0.0.5:6379");

        config.apply_overrides(Some("  ".to_string()));
        assert_eq!(config.cache.url, "redis://10.0.0.5:6379");

        config.apply_overrides(None);
        assert_eq!(config.cache.url, "redis://10.0.0.5:6379");
    }

    #[test]
    fn test_validate_rejects_bad_policy() {
        let toml_str = r#"
[[pools]]
name = "broken"
[pools.policy]
min_capacity = 4
max_capacity = 1
"#;
        let config = DepthscaleConfig::from_toml_str(toml_str).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("broken"), "{err}");
    }

    #[test]
    fn test_validate_rejects_duplicate_pools() {
        let toml_str = r#"
[[pools]]
name = "a"
[[pools]]
name = "a"
"#;
        let config = DepthscaleConfig::from_toml_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = DepthscaleConfig::from_toml_str("").unwrap();
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("redisQueueSize"));
        let reparsed = DepthscaleConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(reparsed.pools[0].policy, config.pools[0].policy);
    }
}
