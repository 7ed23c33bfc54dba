use axum::extract::State;
use axum::{Extension, Json};
use chrono::Utc;

use vigil_analyzer::AnalyzeJob;
use vigil_core::constants::RECENT_PAYLOAD_CAP;
use vigil_core::error::VigilError;
use vigil_coord::keys;
use vigil_tokens::TokenClaims;

use crate::error::ApiError;
use crate::extract::assert_device_access;
use crate::state::AppState;
use crate::types::{HeartbeatAck, HeartbeatIn};

/// Synchronous admission path for one heartbeat: state check, hard gates,
/// durable insert, recent-buffer push, job enqueue, cheap ack.
///
/// The recent-payload list is updated before the job is enqueued, so the
/// analyzer always observes a history consistent with what this ack covers.
pub async fn heartbeat(
    State(ctx): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(body): Json<HeartbeatIn>,
) -> Result<Json<HeartbeatAck>, ApiError> {
    assert_device_access(&body.device_id, &claims)?;

    let state = ctx.coord.get(&keys::device_state_key(&body.device_id)).await?;
    if state.as_deref() == Some("blocked") {
        return Err(VigilError::Blocked("Device blocked".into()).into());
    }

    // An agent that lost device-admin or accessibility can no longer defend
    // the device; treat the report itself as a trust breach.
    if !body.payload.device_admin_enabled || !body.payload.accessibility_enabled {
        ctx.tokens.revoke_and_block(&claims.sub, &body.device_id, true).await?;
        return Err(
            VigilError::Access("Trust breach: admin/accessibility revoked".into()).into(),
        );
    }

    let payload_json = serde_json::to_value(&body.payload)
        .map_err(|e| VigilError::Serialization(e.to_string()))?;
    let signal_id = ctx.store.insert_signal(&body.device_id, &payload_json).await?;

    let sig_key = keys::recent_payload_key(&body.device_id);
    let serialized = serde_json::to_string(&body.payload)
        .map_err(|e| VigilError::Serialization(e.to_string()))?;
    ctx.coord.lpush(&sig_key, &serialized).await?;
    ctx.coord.ltrim(&sig_key, 0, RECENT_PAYLOAD_CAP as isize - 1).await?;

    AnalyzeJob {
        signal_id,
        user_id: claims.sub.clone(),
        device_id: body.device_id.clone(),
        payload: body.payload.clone(),
        enqueued_at: Utc::now(),
    }
    .enqueue(&ctx.coord)
    .await?;

    // Cheap synchronous hint: overlay coverage alone, pending real analysis.
    let trust_hint = (100 - (body.payload.overlay * 100.0).round() as i64).clamp(0, 100);
    Ok(Json(HeartbeatAck { status: "queued", trust_hint: Some(trust_hint) }))
}
