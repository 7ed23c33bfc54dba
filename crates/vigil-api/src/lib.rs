//! vigil-api
//!
//! HTTP and WebSocket surface.
//!
//! Routes:
//!   POST /v1/signals/heartbeat     — ingest a sensor heartbeat      [guarded]
//!   GET  /v1/security/trust-score  — last published decision        [guarded]
//!   GET  /v1/audit/logs            — audit trail, newest first      [guarded]
//!   POST /v1/edr/report            — endpoint-detection report      [guarded]
//!   WS   /v1/security/kill-switch  — kill-switch push socket
//!   WS   /v1/security/priority     — priority socket (overlay, alarms)
//!   POST /v1/billing/webhook       — billing provider events (HMAC)
//!   GET  /v1/billing/subscription  — subscription state
//!   POST /v1/billing/status        — paywall state (attestation entry point)
//!   POST /v1/auth/refresh          — refresh-token rotation
//!   POST /v1/auth/logout           — revoke-and-block
//!   GET  /internal/jwks            — public JWKS
//!
//! Guarded routes pass through the admission filter: bearer verification,
//! device binding, revocation/block markers, paywall, and per-plan rate
//! limits. Billing, auth, and JWKS stay reachable so an expired trial can
//! still pay, re-authenticate, and fetch keys.

pub mod audit;
pub mod auth;
pub mod billing;
pub mod edr;
pub mod error;
pub mod extract;
pub mod guard;
pub mod jwks;
pub mod security;
pub mod signals;
pub mod sockets;
pub mod state;
pub mod types;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{ApiConfig, AppContext, AppState};

/// Assemble the full router. Callers serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the push-socket
/// rate limiter can see client addresses.
pub fn router(ctx: AppState) -> Router {
    let guarded = Router::new()
        .route("/v1/signals/heartbeat", post(signals::heartbeat))
        .route("/v1/security/trust-score", get(security::trust_score))
        .route("/v1/audit/logs", get(audit::list_logs))
        .route("/v1/edr/report", post(edr::report))
        .layer(middleware::from_fn_with_state(ctx.clone(), guard::admission_guard));

    let open = Router::new()
        .route("/v1/security/kill-switch", get(sockets::kill_switch_ws))
        .route("/v1/security/priority", get(sockets::priority_ws))
        .route("/v1/billing/webhook", post(billing::webhook))
        .route("/v1/billing/subscription", get(billing::subscription))
        .route("/v1/billing/status", post(billing::status))
        .route("/v1/auth/refresh", post(auth::refresh))
        .route("/v1/auth/logout", post(auth::logout))
        .route("/internal/jwks", get(jwks::serve_jwks));

    Router::new()
        .merge(guarded)
        .merge(open)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&ctx.config.cors_origins))
        .with_state(ctx)
}

/// Explicit origins when configured, permissive otherwise.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let parsed: Vec<axum::http::HeaderValue> =
            origins.iter().filter_map(|o| o.parse().ok()).collect();
        layer.allow_origin(AllowOrigin::list(parsed))
    }
}
