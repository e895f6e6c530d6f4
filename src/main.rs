//! Hotspot forward proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     Hotspot client           ┌──────────────────────────────────────────────┐
//!     ─────────────────────────┼─▶ net::listener ─▶ proxy::handler            │
//!                              │                    │ http::request (frame)   │
//!                              │                    │ http::target  (resolve) │
//!                              │                    ▼                         │
//!                              │        CONNECT tunnel │ http::rewrite        │
//!                              │                    │                         │
//!     ◀────────────────────────┼─────── proxy::relay ◀──────────────────▶ Origin
//!                              │                                              │
//!                              │  clients::registry   observability   admin   │
//!                              └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use hotspot_proxy::config::{apply_overrides, load_config, ProxyConfig};
use hotspot_proxy::lifecycle::{self, signals};
use hotspot_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "hotspot-proxy")]
#[command(about = "Forward HTTP/CONNECT proxy for hotspot clients", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Interface address to bind (overrides the config file).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    let config = apply_overrides(config, args.port, args.bind)?;

    logging::init_logging(&config.observability);
    tracing::info!("hotspot-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        port = config.listener.port,
        idle_timeout_secs = config.timeouts.idle_secs,
        client_ttl_secs = config.clients.ttl_secs,
        "Configuration loaded"
    );

    let running = lifecycle::start(config).await?;
    tracing::info!(address = %running.proxy_addr, "Proxy ready");

    signals::wait_for_termination().await;
    running.shutdown().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
