//! vigil-server — the trust-and-control-plane binary.
//!
//! Startup sequence:
//!   1. Load environment configuration (exit nonzero if incomplete)
//!   2. Connect the Postgres pool and the coordination store
//!   3. Build the token, access, and push subsystems
//!   4. Spawn the analyzer worker pool
//!   5. Serve the HTTP/WebSocket API until a shutdown signal, then drain

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use vigil_access::{AccessService, AttestationVerifier};
use vigil_analyzer::{AnalyzerMetrics, AnalyzerWorker, BreakerConfig};
use vigil_api::{ApiConfig, AppContext, AppState};
use vigil_coord::CoordClient;
use vigil_push::PushHub;
use vigil_store::Store;
use vigil_tokens::TokenService;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "vigil-server",
    version,
    about = "Vigil — server-side trust and control plane for mobile anti-fraud agents"
)]
struct Args {
    /// API listen address.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Analyzer worker count override (default: ANALYZER_WORKERS or CPU count).
    #[arg(long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vigil=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("vigil server starting");

    let config = Config::from_env().context("loading configuration")?;

    // ── Stores ────────────────────────────────────────────────────────────────
    let store = Store::connect(&config.database_url)
        .await
        .context("connecting to Postgres")?;
    let coord = CoordClient::connect(&config.redis_url)
        .await
        .context("connecting to the coordination store")?;

    // ── Subsystems ────────────────────────────────────────────────────────────
    let tokens = Arc::new(TokenService::new(config.tokens.clone(), coord.clone()));
    let verifier = AttestationVerifier::new(
        config.play_integrity_api_key.clone(),
        config.app_attest_validator_url.clone(),
    );
    let access = AccessService::new(store.clone(), coord.clone(), verifier);
    let hub = PushHub::new();
    let metrics = Arc::new(AnalyzerMetrics::new().context("building analyzer metrics")?);

    // ── Analyzer worker pool ──────────────────────────────────────────────────
    let worker_count = args
        .workers
        .or(config.analyzer_workers)
        .unwrap_or_else(|| {
            std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        });
    let breakers = BreakerConfig {
        queue_depth_limit: config.analyzer_queue_depth_limit,
        p95_limit_ms: config.analyzer_p95_limit_ms,
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut worker_handles = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let worker = Arc::new(AnalyzerWorker::new(
            coord.clone(),
            store.clone(),
            Arc::clone(&tokens),
            Arc::clone(&metrics),
            breakers,
        ));
        worker_handles.push(tokio::spawn(worker.run(shutdown_rx.clone())));
    }
    info!(worker_count, "analyzer workers started");

    // ── API ───────────────────────────────────────────────────────────────────
    let ctx: AppState = Arc::new(AppContext {
        config: ApiConfig {
            ws_allowed_origins: config.ws_allowed_origins.clone(),
            ws_rate_limit_window_secs: config.ws_rate_limit_window_secs,
            ws_rate_limit_max: config.ws_rate_limit_max,
            billing_webhook_secret: config.billing_webhook_secret.clone(),
            jwks_document: config.jwks_document.clone(),
            cors_origins: config.cors_origins.clone(),
        },
        coord,
        store,
        tokens,
        access,
        hub,
    });
    let app = vigil_api::router(ctx);

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    info!(addr = %args.bind, environment = %config.environment, "API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving API")?;

    // ── Drain ─────────────────────────────────────────────────────────────────
    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        let _ = handle.await;
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
