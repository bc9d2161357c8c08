//! Evaluate mode: offline policy check for one pool.

use depthscale_autoscale::evaluate;
use depthscale_core::DepthscaleConfig;

/// Print the delta and resulting capacity for `value` as one JSON line.
pub fn run_evaluate(config: &DepthscaleConfig, pool: &str, value: f64) -> anyhow::Result<()> {
    let pool_config = config
        .pool(pool)
        .ok_or_else(|| anyhow::anyhow!("no pool named {pool} in configuration"))?;

    let policy = &pool_config.policy;
    let current = policy.clamp_capacity(pool_config.initial_capacity, 0);
    let delta = evaluate(value, policy);
    let capacity = policy.clamp_capacity(current, delta);

    println!(
        "{}",
        serde_json::json!({
            "pool": pool_config.name,
            "value": value,
            "delta": delta,
            "current_capacity": current,
            "new_capacity": capacity,
        })
    );
    Ok(())
}
