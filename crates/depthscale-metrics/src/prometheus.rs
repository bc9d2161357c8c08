//! Prometheus text exposition format.
//!
//! Renders the latest metric samples, pool capacities, and proxy
//! invocation counters for scraping by a Prometheus server.

use depthscale_core::MetricSample;
use depthscale_state::PoolRecord;

use crate::collector::InvocationCounters;

/// Escape a label value per the exposition format.
fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Render samples, pools, and counters into Prometheus text format.
pub fn render_prometheus(
    samples: &[MetricSample],
    pools: &[PoolRecord],
    counters: &InvocationCounters,
) -> String {
    let mut out = String::new();

    out.push_str("# HELP depthscale_metric_value Latest published value per metric series.\n");
    out.push_str("# TYPE depthscale_metric_value gauge\n");
    for s in samples {
        out.push_str(&format!(
            "depthscale_metric_value{{namespace=\"{}\",name=\"{}\",unit=\"{}\"}} {}\n",
            escape(&s.namespace),
            escape(&s.name),
            s.unit,
            s.value
        ));
    }

    out.push_str("# HELP depthscale_metric_timestamp_ms Publish time of the latest sample.\n");
    out.push_str("# TYPE depthscale_metric_timestamp_ms gauge\n");
    for s in samples {
        out.push_str(&format!(
            "depthscale_metric_timestamp_ms{{namespace=\"{}\",name=\"{}\"}} {}\n",
            escape(&s.namespace),
            escape(&s.name),
            s.timestamp_ms
        ));
    }

    out.push_str("# HELP depthscale_pool_capacity Committed worker pool capacity.\n");
    out.push_str("# TYPE depthscale_pool_capacity gauge\n");
    for p in pools {
        out.push_str(&format!(
            "depthscale_pool_capacity{{pool=\"{}\"}} {}\n",
            escape(&p.name),
            p.current_capacity
        ));
    }

    out.push_str("# HELP depthscale_pool_min_capacity Lower capacity bound.\n");
    out.push_str("# TYPE depthscale_pool_min_capacity gauge\n");
    for p in pools {
        out.push_str(&format!(
            "depthscale_pool_min_capacity{{pool=\"{}\"}} {}\n",
            escape(&p.name),
            p.min_capacity
        ));
    }

    out.push_str("# HELP depthscale_pool_max_capacity Upper capacity bound.\n");
    out.push_str("# TYPE depthscale_pool_max_capacity gauge\n");
    for p in pools {
        out.push_str(&format!(
            "depthscale_pool_max_capacity{{pool=\"{}\"}} {}\n",
            escape(&p.name),
            p.max_capacity
        ));
    }

    out.push_str("# HELP depthscale_invocations_total Proxy invocations by outcome.\n");
    out.push_str("# TYPE depthscale_invocations_total counter\n");
    for (outcome, count) in counters.snapshot() {
        out.push_str(&format!(
            "depthscale_invocations_total{{outcome=\"{outcome}\"}} {count}\n"
        ));
    }

    out.push_str("# HELP depthscale_non_numeric_reads_total Reads whose value was not a number.\n");
    out.push_str("# TYPE depthscale_non_numeric_reads_total counter\n");
    out.push_str(&format!(
        "depthscale_non_numeric_reads_total {}\n",
        counters.non_numeric()
    ));

    out
}
