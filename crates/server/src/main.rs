// SPDX-License-Identifier: MIT

//! `low-tide`: the job service binary. Loads config, opens the Store
//! (which runs startup recovery), spawns the Scheduler, and serves the
//! HTTP/WebSocket surface.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use low_tide::routes;
use low_tide::state::AppState;
use low_tide_broker::Broker;
use low_tide_config::Config;
use low_tide_store::Store;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "low-tide", about = "Single-host supervised URL downloader")]
struct Args {
    /// Path to the apps/directories YAML config file.
    #[arg(long, default_value = "low-tide.yaml")]
    config: std::path::PathBuf,

    /// Address to bind the HTTP/WebSocket surface to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let config = Arc::new(Config::load(&args.config)?);
    tracing::info!(data_root = %config.data_root.display(), apps = config.apps.len(), "loaded config");

    let store = Arc::new(Store::open(&config.database_path)?);
    let broker = Broker::default();
    let scheduler = low_tide_scheduler::spawn(config.clone(), store.clone(), broker.clone());
    // Pick up anything left `queued` by a previous run (startup recovery
    // already rewrote stray `running` rows inside `Store::open`).
    scheduler.wake();

    let app = routes::router(AppState { config, store, broker, scheduler });

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(addr = %args.bind, "low-tide listening");
    axum::serve(listener, app).await?;

    Ok(())
}
