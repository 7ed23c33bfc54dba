use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use vigil_access::AttestationPayload;
use vigil_core::payload::SensorPayload;

// ── Query parameters ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    pub device_id: String,
}

// ── Signals ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HeartbeatIn {
    pub device_id: String,
    pub payload: SensorPayload,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatAck {
    pub status: &'static str,
    pub trust_hint: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TrustScoreOut {
    pub device_id: String,
    pub score: i64,
    pub verdict: &'static str,
}

// ── Billing ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BillingWebhookIn {
    pub provider: String,
    pub event_id: String,
    pub user_id: String,
    pub device_id: String,
    pub plan_code: String,
    pub plan_tier: String,
    pub status: String,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub auto_renew: bool,
    #[serde(default)]
    pub payload: serde_json::Value,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct SubscriptionOut {
    pub user_id: String,
    pub device_id: String,
    pub plan_code: String,
    pub status: String,
    pub plan_tier: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct BillingStatusIn {
    pub device_id: String,
    pub attestation: Option<AttestationPayload>,
}

#[derive(Debug, Serialize)]
pub struct BillingStatusOut {
    pub user_id: String,
    pub device_id: String,
    pub is_premium: bool,
    pub trial_expired: bool,
    pub trial_started_at: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

// ── Auth ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RefreshIn {
    pub refresh_token: String,
    pub fingerprint: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutIn {
    pub device_id: String,
    #[serde(default)]
    pub block: bool,
}

// ── EDR ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct EdrReportOut {
    pub device_id: String,
    pub risk_score: i64,
    pub risk_level: String,
    pub actions: Vec<String>,
}
