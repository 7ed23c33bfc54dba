use axum::extract::{Query, State};
use axum::{Extension, Json};

use vigil_core::constants::{DEFAULT_TRUST_SCORE, TRUST_VERDICT_THRESHOLD};
use vigil_coord::keys;
use vigil_tokens::TokenClaims;

use crate::error::ApiError;
use crate::extract::assert_device_access;
use crate::state::AppState;
use crate::types::{DeviceQuery, TrustScoreOut};

/// Last published trust decision for a device. Devices without one yet are
/// presumed healthy.
pub async fn trust_score(
    State(ctx): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<TrustScoreOut>, ApiError> {
    assert_device_access(&query.device_id, &claims)?;

    let score = ctx
        .coord
        .get(&keys::decision_key(&query.device_id))
        .await?
        .and_then(|raw| raw.parse::<i64>().ok())
        .unwrap_or(DEFAULT_TRUST_SCORE);

    let verdict = if score >= TRUST_VERDICT_THRESHOLD { "safe" } else { "block" };
    Ok(Json(TrustScoreOut { device_id: query.device_id, score, verdict }))
}
