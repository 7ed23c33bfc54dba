use axum::extract::{Query, State};
use axum::{Extension, Json};

use vigil_store::AuditLogRow;
use vigil_tokens::TokenClaims;

use crate::error::ApiError;
use crate::extract::assert_device_access;
use crate::state::AppState;
use crate::types::DeviceQuery;

const AUDIT_PAGE_LIMIT: i64 = 200;

/// Audit trail for one device, newest first.
pub async fn list_logs(
    State(ctx): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<Vec<AuditLogRow>>, ApiError> {
    assert_device_access(&query.device_id, &claims)?;
    let rows = ctx
        .store
        .recent_audit(&claims.sub, &query.device_id, AUDIT_PAGE_LIMIT)
        .await?;
    Ok(Json(rows))
}
