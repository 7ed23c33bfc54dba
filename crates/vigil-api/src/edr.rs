use axum::extract::State;
use axum::{Extension, Json};
use tracing::warn;

use vigil_core::constants::KILL_SWITCH_CHANNEL;
use vigil_core::payload::EdrReport;
use vigil_core::types::ThreatLevel;
use vigil_tokens::TokenClaims;
use vigil_trust::compute_risk;

use crate::error::ApiError;
use crate::extract::assert_device_access;
use crate::state::AppState;
use crate::types::EdrReportOut;

/// Score an endpoint-detection report. High/critical findings land in the
/// audit log; critical findings additionally revoke-and-block the device and
/// push an immediate quarantine through the kill-switch channel.
pub async fn report(
    State(ctx): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Json(body): Json<EdrReport>,
) -> Result<Json<EdrReportOut>, ApiError> {
    assert_device_access(&body.device_id, &claims)?;

    let risk = compute_risk(&body);

    if risk.level.is_auditable() {
        let reason = if risk.actions.is_empty() {
            "edr_report".to_string()
        } else {
            risk.actions.join(";")
        };
        ctx.store
            .insert_audit(&claims.sub, &body.device_id, risk.level, &reason, None)
            .await?;
    }

    if risk.level == ThreatLevel::Critical {
        ctx.tokens.revoke_and_block(&claims.sub, &body.device_id, true).await?;
        let quarantine = format!("IMMEDIATE_QUARANTINE:{}", body.device_id);
        if let Err(e) = ctx.coord.publish(KILL_SWITCH_CHANNEL, &quarantine).await {
            warn!(device_id = %body.device_id, error = %e, "quarantine publish failed");
        }
    }

    Ok(Json(EdrReportOut {
        device_id: body.device_id,
        risk_score: risk.score,
        risk_level: risk.level.as_str().to_string(),
        actions: risk.actions,
    }))
}
