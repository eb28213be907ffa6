//! # zkauth-api: Binary Entry Point
//!
//! Starts the Axum HTTP server for the verifier.
//! Configuration comes from the environment (see [`AppConfig::from_env`]).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use zkauth_api::render::SvgFileRenderer;
use zkauth_api::state::AppConfig;
use zkauth_api::sweeper::{spawn_sweeper, sweep_interval};
use zkauth_api::AppState;
use zkauth_resolver::ResolverRegistry;
use zkauth_zkp::{DigestEngine, FsKeyLoader, PreloadedKeys, ProofEngine};

/// How often the Prometheus recorder drains its histogram buffers.
const METRICS_UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("loading configuration")?;
    tracing::info!(?config, "configuration loaded");

    // Fail fast on missing verification keys.
    let keys = PreloadedKeys::preload(&FsKeyLoader::new(config.keys_dir.clone()), config.required_circuits())
        .with_context(|| format!("preloading verification keys from {}", config.keys_dir.display()))?;
    tracing::info!(circuits = ?keys.circuits(), "verification keys loaded");

    let engine = DigestEngine;
    config
        .proof_policy
        .validate(engine.backend())
        .context("proof backend policy")?;
    tracing::warn!("digest proof engine in use; proofs are not zero-knowledge");

    let resolvers = ResolverRegistry::from_endpoints(&config.resolvers, config.resolver_timeout)
        .context("building state resolvers")?;
    tracing::info!(chains = ?resolvers.prefixes(), "state resolvers registered");

    let metrics = zkauth_api::middleware::metrics::install_recorder()
        .context("installing Prometheus recorder")?;

    let port = config.port;
    let qr_output_path = config.qr_output_path.clone();
    let mut state = AppState::new(config, Arc::new(engine), Arc::new(keys), resolvers)
        .with_metrics(metrics.clone());
    if let Some(path) = qr_output_path {
        tracing::info!(path = %path.display(), "challenge QR codes will be written");
        state = state.with_renderer(Arc::new(SvgFileRenderer::new(path)));
    }

    let sweeper = spawn_sweeper(state.sessions().clone(), sweep_interval(state.config.session_ttl));
    let upkeep = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(METRICS_UPKEEP_INTERVAL);
        loop {
            ticker.tick().await;
            metrics.run_upkeep();
        }
    });

    let app = zkauth_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("zkauth verifier listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    sweeper.abort();
    upkeep.abort();
    tracing::info!("shut down");
    Ok(())
}

/// Structured tracing; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
