//! lor-daemon entry point.
//!
//! Thin on purpose: load config and secrets, build the two process-wide
//! clients, run a boot health check, wire middleware, and serve until Ctrl-C
//! or SIGTERM. Route handlers live in `routes.rs`; shared state in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use lor_chain::{ChainRpc, HttpChainRpc};
use lor_daemon::{routes, state};
use lor_venue::{JupiterLimitOrderApi, LimitOrderVenue};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "lor-daemon")]
#[command(about = "HTTP relay for limit orders on the Jupiter venue", long_about = None)]
struct Args {
    /// Config YAML paths; later files override earlier ones.
    #[arg(long = "config", default_value = "config/relay.yaml")]
    config: Vec<String>,

    /// Bind address. `LOR_DAEMON_ADDR` takes precedence when set.
    #[arg(long)]
    addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience).
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let args = Args::parse();
    let paths: Vec<&str> = args.config.iter().map(String::as_str).collect();
    let loaded = lor_config::load_layered_yaml(&paths).context("load config")?;
    let cfg = loaded.relay().context("parse relay config")?;
    let secrets = lor_config::resolve_secrets(&cfg).context("resolve secrets")?;
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");

    let rpc = HttpChainRpc::new(
        secrets.rpc_url,
        cfg.chain.commitment.as_str(),
        Duration::from_millis(cfg.chain.rpc_timeout_ms),
    )
    .context("build chain rpc client")?;
    let venue = JupiterLimitOrderApi::new_with_base_url(
        cfg.venue.base_url.clone(),
        Duration::from_millis(cfg.venue.http_timeout_ms),
    )
    .context("build venue client")?
    .with_api_key(secrets.venue_api_key);

    info!(venue = venue.name(), "venue client ready");

    let rpc: Arc<dyn ChainRpc> = Arc::new(rpc);
    // The node may be catching up; /health keeps reporting until it is not.
    match rpc.health().await {
        Ok(()) => info!("rpc node healthy"),
        Err(e) => warn!(error = %e, "rpc node unhealthy at boot; serving anyway"),
    }

    let shared = Arc::new(state::AppState::new(&cfg, Arc::new(venue), rpc));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env()
        .or(args.addr)
        .unwrap_or(cfg.server.bind_addr);
    info!("lor-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    info!("lor-daemon stopped");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("LOR_DAEMON_ADDR").ok()?.parse().ok()
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received; draining in-flight requests");
}

/// CORS: allow only the relay's own localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
