//! depthscaled: the depthscale daemon.
//!
//! Single binary that assembles the depthscale subsystems:
//! - State store (redb) backing the local metric channel
//! - Cache connector (Redis RESP or in-memory)
//! - Cache proxy behind the HTTP API
//! - One autoscaler per configured worker pool
//!
//! # Usage
//!
//! ```text
//! depthscaled serve --config depthscale.toml --port 8080 --data-dir /var/lib/depthscale
//! depthscaled evaluate --config depthscale.toml --pool workers --value 55
//! ```

mod evaluate;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,depthscaled=debug,depthscale_proxy=debug,depthscale_autoscale=debug";

#[derive(Parser)]
#[command(name = "depthscaled", about = "depthscale daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API and the pool autoscalers.
    Serve {
        /// TOML configuration file. Built-in defaults when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/depthscale")]
        data_dir: PathBuf,

        /// Emit logs as JSON lines.
        #[arg(long)]
        log_json: bool,
    },

    /// Evaluate a pool's policy against a metric value, without side effects.
    Evaluate {
        /// TOML configuration file. Built-in defaults when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pool whose policy to evaluate.
        #[arg(long, default_value = "workers")]
        pool: String,

        /// Metric value to evaluate.
        #[arg(long, allow_negative_numbers = true)]
        value: f64,
    },
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            data_dir,
            log_json,
        } => {
            init_tracing(log_json);
            let config = serve::load_config(config.as_deref())?;
            serve::run_serve(config, port, data_dir).await
        }
        Command::Evaluate {
            config,
            pool,
            value,
        } => {
            init_tracing(false);
            let config = serve::load_config(config.as_deref())?;
            evaluate::run_evaluate(&config, &pool, value)
        }
    }
}
