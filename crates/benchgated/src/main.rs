//! benchgated: the bench lease gateway daemon.
//!
//! # Usage
//!
//! ```text
//! benchgated serve --config /etc/benchgate/benchgate.toml
//! benchgated check --config ./benchgate.toml
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use benchgate_core::GatewayConfig;

#[derive(Parser)]
#[command(name = "benchgated", about = "Bench lease gateway")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the gateway.
    Serve {
        /// Path to benchgate.toml.
        #[arg(long, default_value = "/etc/benchgate/benchgate.toml")]
        config: PathBuf,

        /// Listen address, overrides `server.listen`.
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
    /// Validate a config file and print the bench pool.
    Check {
        #[arg(long, default_value = "/etc/benchgate/benchgate.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Serve { config, listen } => serve(&config, listen).await,
        Command::Check { config } => check(&config),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,benchgated=debug,benchgate=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load(path: &Path) -> anyhow::Result<GatewayConfig> {
    GatewayConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
}

async fn serve(config_path: &Path, listen: Option<SocketAddr>) -> anyhow::Result<()> {
    let config = load(config_path)?;
    let addr = match listen {
        Some(addr) => addr,
        None => config
            .server
            .listen
            .parse()
            .with_context(|| format!("invalid server.listen {:?}", config.server.listen))?,
    };
    info!(
        benches = config.benches.len(),
        products = config.products.len(),
        lease_ttl_secs = config.server.lease_ttl_secs,
        "benchgate starting"
    );
    if config.home_domain().is_none() {
        warn!("server.home_domain not set, BMC fallbacks answer with an empty page");
    }

    let state = benchgate_api::AppState::from_config(&config)?;
    let router = benchgate_api::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "ctrl-c handler unavailable");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("benchgate stopped");
    Ok(())
}

fn check(config_path: &Path) -> anyhow::Result<()> {
    let config = load(config_path)?;
    let pool = serde_json::json!({
        "listen": config.server.listen,
        "lease_ttl_secs": config.server.lease_ttl_secs,
        "products": config.product_catalog(),
        "benches": config
            .bench_specs()
            .iter()
            .map(|b| serde_json::json!({
                "name": b.name,
                "product": b.product,
                "control": b.control,
                "compile": b.compile,
                "bmc": b.bmc_endpoint(),
            }))
            .collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&pool)?);
    Ok(())
}
