use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use futures::FutureExt;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// alertd is the alerting control-plane daemon: tenants define triggers,
/// submit telemetry, and consume alerts and events through its query and
/// live-watch API.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Args {
    /// Address to bind the API listener to.
    #[arg(long, default_value = "127.0.0.1", env = "BIND_ADDRESS")]
    bind_address: String,
    /// Port to listen on for API requests.
    #[arg(long, default_value = "8080", env = "API_PORT")]
    api_port: u16,
    /// Default poll interval, in seconds, for watch connections that
    /// don't pass `watchInterval`.
    #[arg(long, default_value_t = alertd::watch::DEFAULT_WATCH_INTERVAL_SECS, env = "WATCH_INTERVAL")]
    watch_interval: u64,
}

fn main() -> anyhow::Result<()> {
    // Reasonable defaults for printing structured logs to stderr.
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    tracing::info!(?args, "starting alertd");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(async_main(args));

    tracing::info!(?result, "alertd exiting");
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    result
}

async fn async_main(args: Args) -> anyhow::Result<()> {
    // The standalone in-memory store backs all three service interfaces.
    // A clustered deployment would wire remote services here instead.
    let store = Arc::new(services::StandaloneStore::new());
    store.register_plugin("email", ["to", "from", "cc"]);
    store.register_plugin("webhook", ["url", "method", "timeout"]);

    let app = Arc::new(alertd::App {
        definitions: store.clone(),
        alerts: store.clone(),
        actions: store,
        watch_interval: std::time::Duration::from_secs(args.watch_interval),
    });

    let listener = tokio::net::TcpListener::bind((args.bind_address.as_str(), args.api_port))
        .await
        .context("failed to bind API listener")?;
    tracing::info!(
        address = %listener.local_addr().expect("listener has a local address"),
        "serving API"
    );

    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    axum::serve(listener, alertd::build_router(app))
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server failed")
}
