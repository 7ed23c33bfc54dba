use axum::extract::State;
use axum::Json;

use vigil_tokens::TokenPair;

use crate::error::ApiError;
use crate::extract::{assert_device_access, CurrentClaims};
use crate::state::AppState;
use crate::types::{LogoutIn, RefreshIn};

/// Redeem a refresh token for a new pair. No bearer auth here: the refresh
/// token itself is the credential, and it is single-use.
pub async fn refresh(
    State(ctx): State<AppState>,
    Json(body): Json<RefreshIn>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = ctx.tokens.refresh(&body.refresh_token, &body.fingerprint).await?;
    Ok(Json(pair))
}

/// Revoke every credential for the device; with `block` set, the logout is
/// also announced on the kill-switch channel.
pub async fn logout(
    State(ctx): State<AppState>,
    CurrentClaims(claims): CurrentClaims,
    Json(body): Json<LogoutIn>,
) -> Result<Json<serde_json::Value>, ApiError> {
    assert_device_access(&body.device_id, &claims)?;
    ctx.tokens
        .revoke_and_block(&claims.sub, &body.device_id, body.block)
        .await?;
    Ok(Json(serde_json::json!({ "detail": "Logged out" })))
}
