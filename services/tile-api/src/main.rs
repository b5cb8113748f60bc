//! SkyView tile service.
//!
//! HTTP server that turns sky-survey cutout requests into cached PNG figures.

use std::{env, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tile_api::{build_router, config::ServiceConfig, state::AppState};

#[derive(Parser, Debug)]
#[command(name = "tile-api")]
#[command(about = "Sky survey cutout tile server")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    listen: String,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format: json or pretty
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    log_format: String,

    /// Number of tokio worker threads (default: number of CPU cores)
    #[arg(long)]
    worker_threads: Option<usize>,

    /// Optional YAML configuration file
    #[arg(short, long, env = "TILE_API_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding cached cutouts
    #[arg(long, env = "CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Directory holding the front-end bundle served at /app
    #[arg(long, env = "WEB_DIR")]
    web_dir: Option<PathBuf>,

    /// SkyView base URL
    #[arg(long, env = "SKYVIEW_BASE_URL")]
    skyview_url: Option<String>,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, &args.log_format)?;

    let runtime = build_runtime(args.worker_threads)?;
    runtime.block_on(async_main(args))
}

/// Multi-threaded runtime; worker count from the flag, then `TOKIO_WORKER_THREADS`.
fn build_runtime(worker_threads: Option<usize>) -> Result<tokio::runtime::Runtime> {
    let threads = worker_threads.or_else(|| {
        env::var("TOKIO_WORKER_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
    });

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(threads) = threads.filter(|t| *t > 0) {
        info!(worker_threads = threads, "Configuring tokio runtime");
        builder.worker_threads(threads);
    }
    builder.build().context("Failed to build tokio runtime")
}

fn init_tracing(log_level: &str, log_format: &str) -> Result<()> {
    let level = log_level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder().with_max_level(level);

    if log_format.eq_ignore_ascii_case("pretty") {
        tracing::subscriber::set_global_default(builder.pretty().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    }
    Ok(())
}

async fn async_main(args: Args) -> Result<()> {
    let config = ServiceConfig::load(args.config.as_deref())?
        .with_cache_dir(args.cache_dir)
        .with_web_dir(args.web_dir)
        .with_skyview_url(args.skyview_url);

    // Initialize Prometheus metrics exporter
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    info!("Prometheus metrics exporter initialized");

    info!("Starting SkyView tile server");
    let state = Arc::new(AppState::new(config, prometheus_handle)?);
    let app = build_router(state);

    // Parse listen address
    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address '{}'", args.listen))?;
    info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
