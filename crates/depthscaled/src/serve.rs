//! Serve mode: HTTP API plus one autoscaler per pool, in one process.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};

use depthscale_api::{ApiState, build_router};
use depthscale_autoscale::{Autoscaler, DesiredCountPool};
use depthscale_core::DepthscaleConfig;
use depthscale_metrics::{MetricChannel, StoreChannel};
use depthscale_proxy::{CacheProxy, ProxySettings};
use depthscale_state::StateStore;

/// Read the config file, or fall back to defaults plus environment.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<DepthscaleConfig> {
    match path {
        Some(path) => {
            let config = DepthscaleConfig::from_file(path)
                .map_err(|e| anyhow::anyhow!("failed to load {}: {e:#}", path.display()))?;
            info!(path = %path.display(), pools = config.pools.len(), "configuration loaded");
            Ok(config)
        }
        None => {
            info!("no configuration file, using defaults");
            Ok(DepthscaleConfig::from_env())
        }
    }
}

pub async fn run_serve(config: DepthscaleConfig, port: u16, data_dir: PathBuf) -> anyhow::Result<()> {
    info!("depthscale daemon starting");

    // Ensure data directory exists.
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("depthscale.redb");

    // ── Initialize subsystems ──────────────────────────────────

    // State store.
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    // Metric channel.
    let channel: Arc<dyn MetricChannel> = Arc::new(StoreChannel::new(store.clone()));

    // Cache connector.
    let connector = depthscale_cache::connector_from_url(
        &config.cache.url,
        config.cache.connect_timeout(),
        config.cache.command_timeout(),
    )?;
    info!(cache = %connector.target(), "cache connector initialized");

    // Proxy.
    let proxy = Arc::new(CacheProxy::new(
        connector,
        channel.clone(),
        ProxySettings::from_config(&config),
    ));

    // Autoscalers.
    let mut autoscalers = Vec::with_capacity(config.pools.len());
    for pool_config in &config.pools {
        let capacity = match store.get_pool(&pool_config.name)? {
            Some(record) => {
                info!(
                    pool = %pool_config.name,
                    capacity = record.current_capacity,
                    "resuming from persisted capacity"
                );
                record.current_capacity
            }
            None => pool_config.initial_capacity,
        };
        let pool = Arc::new(DesiredCountPool::new(pool_config.name.clone(), capacity));
        let autoscaler = Autoscaler::new(
            pool_config.policy.clone(),
            pool_config.source.series(&config.metric),
            capacity,
            pool,
            channel.clone(),
        )
        .with_store(store.clone());
        info!(pool = %pool_config.name, "autoscaler initialized");
        autoscalers.push(autoscaler);
    }

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let interval = config.autoscaler.interval();
    let mut handles = Vec::with_capacity(autoscalers.len());
    for autoscaler in autoscalers {
        let shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            autoscaler.run(interval, shutdown).await;
        }));
    }

    // ── Start API server ───────────────────────────────────────

    let router = build_router(ApiState {
        store,
        proxy,
        channel,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    for handle in handles {
        let _ = handle.await;
    }

    info!("depthscale daemon stopped");
    Ok(())
}

/// Resolve on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
