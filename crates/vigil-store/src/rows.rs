use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

// ── Durable rows ─────────────────────────────────────────────────────────────

/// One appended audit entry. Keyed by `(user_id, device_id, created_at)` on
/// the read path; newest first.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLogRow {
    pub id: i64,
    pub user_id: String,
    pub device_id: String,
    pub threat_level: String,
    pub reason: String,
    pub signal_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Subscription state for a `(user_id, device_id)` pair. Mutated only by the
/// billing-webhook path.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SubscriptionRow {
    pub id: Uuid,
    pub user_id: String,
    pub device_id: String,
    pub plan_code: String,
    pub plan_tier: String,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One registration per `(user_id, device_id)`; `created_at` doubles as the
/// trial start. Attestation fields are written once.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeviceRegistrationRow {
    pub id: Uuid,
    pub user_id: String,
    pub device_id: String,
    pub created_at: DateTime<Utc>,
    pub attestation_type: Option<String>,
    pub attestation_nonce: Option<String>,
    pub attested_public_key_hash: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub risk_reason: Option<String>,
}
