use std::sync::Arc;

use vigil_access::AccessService;
use vigil_coord::CoordClient;
use vigil_push::PushHub;
use vigil_store::Store;
use vigil_tokens::TokenService;

/// Request-path configuration the API needs at runtime.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Push-socket Origin allowlist; empty disables the check.
    pub ws_allowed_origins: Vec<String>,
    pub ws_rate_limit_window_secs: i64,
    pub ws_rate_limit_max: i64,
    pub billing_webhook_secret: String,
    /// Served verbatim at /internal/jwks.
    pub jwks_document: Option<serde_json::Value>,
    /// CORS allowlist; empty means permissive.
    pub cors_origins: Vec<String>,
}

/// Process-wide shared state, built once at startup and torn down on
/// graceful shutdown. Handlers receive it as `State<AppState>`.
pub struct AppContext {
    pub config: ApiConfig,
    pub coord: CoordClient,
    pub store: Store,
    pub tokens: Arc<TokenService>,
    pub access: AccessService,
    pub hub: Arc<PushHub>,
}

pub type AppState = Arc<AppContext>;
