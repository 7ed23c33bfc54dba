use axum::extract::State;
use axum::Json;

use vigil_core::error::VigilError;

use crate::error::ApiError;
use crate::state::AppState;

/// Public JWKS for token verification by clients and sibling services.
/// Served verbatim from configuration.
pub async fn serve_jwks(State(ctx): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.config
        .jwks_document
        .clone()
        .map(Json)
        .ok_or_else(|| VigilError::Config("No JWKS configured".into()).into())
}
