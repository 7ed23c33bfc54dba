use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use vigil_core::error::VigilError;
use vigil_core::types::{AttestationRecord, ThreatLevel};

use crate::rows::{AuditLogRow, DeviceRegistrationRow, SubscriptionRow};

fn storage_err(e: sqlx::Error) -> VigilError {
    VigilError::Storage(e.to_string())
}

/// Persistence gateway backed by Postgres.
///
/// Tables:
///   signals              — id bigserial, device_id, payload jsonb, created_at
///   audit_log            — id bigserial, user_id, device_id, threat_level, reason,
///                          signal_id nullable, created_at
///   subscriptions        — id uuid, (user_id, device_id) unique, plan_code,
///                          plan_tier, status, expires_at, auto_renew,
///                          created_at, updated_at
///   billing_events       — id uuid, provider, event_id unique, payload jsonb,
///                          created_at
///   device_registrations — id uuid, (user_id, device_id) unique, created_at,
///                          attestation_type, attestation_nonce,
///                          attested_public_key_hash, verified_at, risk_reason
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connect with a bounded pool. Connections are pinged before handout so
    /// a silently dropped backend surfaces as a reconnect, not a query error.
    pub async fn connect(url: &str) -> Result<Self, VigilError> {
        let pool = PgPoolOptions::new()
            .max_connections(16)
            .test_before_acquire(true)
            .connect(url)
            .await
            .map_err(storage_err)?;
        Ok(Self { pool })
    }

    // ── Signals ──────────────────────────────────────────────────────────────

    /// Append a heartbeat signal; returns the row id for audit correlation.
    pub async fn insert_signal(
        &self,
        device_id: &str,
        payload: &serde_json::Value,
    ) -> Result<i64, VigilError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO signals (device_id, payload, created_at) \
             VALUES ($1, $2, NOW()) RETURNING id",
        )
        .bind(device_id)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(id)
    }

    // ── Audit log ────────────────────────────────────────────────────────────

    pub async fn insert_audit(
        &self,
        user_id: &str,
        device_id: &str,
        threat_level: ThreatLevel,
        reason: &str,
        signal_id: Option<i64>,
    ) -> Result<(), VigilError> {
        sqlx::query(
            "INSERT INTO audit_log (user_id, device_id, threat_level, reason, signal_id, created_at) \
             VALUES ($1, $2, $3, $4, $5, NOW())",
        )
        .bind(user_id)
        .bind(device_id)
        .bind(threat_level.as_str())
        .bind(reason)
        .bind(signal_id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    /// Newest audit entries for one device, capped by `limit`.
    pub async fn recent_audit(
        &self,
        user_id: &str,
        device_id: &str,
        limit: i64,
    ) -> Result<Vec<AuditLogRow>, VigilError> {
        sqlx::query_as::<_, AuditLogRow>(
            "SELECT id, user_id, device_id, threat_level, reason, signal_id, created_at \
             FROM audit_log WHERE user_id = $1 AND device_id = $2 \
             ORDER BY created_at DESC LIMIT $3",
        )
        .bind(user_id)
        .bind(device_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)
    }

    // ── Device registrations ─────────────────────────────────────────────────

    pub async fn get_registration(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<DeviceRegistrationRow>, VigilError> {
        sqlx::query_as::<_, DeviceRegistrationRow>(
            "SELECT id, user_id, device_id, created_at, attestation_type, attestation_nonce, \
                    attested_public_key_hash, verified_at, risk_reason \
             FROM device_registrations WHERE user_id = $1 AND device_id = $2",
        )
        .bind(user_id)
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)
    }

    pub async fn insert_registration(
        &self,
        user_id: &str,
        device_id: &str,
        attestation: &AttestationRecord,
    ) -> Result<DeviceRegistrationRow, VigilError> {
        sqlx::query_as::<_, DeviceRegistrationRow>(
            "INSERT INTO device_registrations \
             (id, user_id, device_id, created_at, attestation_type, attestation_nonce, \
              attested_public_key_hash, verified_at, risk_reason) \
             VALUES ($1, $2, $3, NOW(), $4, $5, $6, $7, $8) \
             RETURNING id, user_id, device_id, created_at, attestation_type, attestation_nonce, \
                       attested_public_key_hash, verified_at, risk_reason",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(device_id)
        .bind(&attestation.attestation_type)
        .bind(&attestation.nonce)
        .bind(&attestation.public_key_hash)
        .bind(attestation.verified_at)
        .bind(&attestation.risk_reason)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)
    }

    /// Late attestation fill-in. One-shot: only rows whose `verified_at` is
    /// still null are touched.
    pub async fn fill_attestation(
        &self,
        registration_id: Uuid,
        attestation: &AttestationRecord,
    ) -> Result<(), VigilError> {
        sqlx::query(
            "UPDATE device_registrations \
             SET attestation_type = $2, attestation_nonce = $3, \
                 attested_public_key_hash = $4, verified_at = $5, risk_reason = $6 \
             WHERE id = $1 AND verified_at IS NULL",
        )
        .bind(registration_id)
        .bind(&attestation.attestation_type)
        .bind(&attestation.nonce)
        .bind(&attestation.public_key_hash)
        .bind(attestation.verified_at)
        .bind(&attestation.risk_reason)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    // ── Subscriptions ────────────────────────────────────────────────────────

    pub async fn get_subscription(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<SubscriptionRow>, VigilError> {
        sqlx::query_as::<_, SubscriptionRow>(
            "SELECT id, user_id, device_id, plan_code, plan_tier, status, expires_at, \
                    auto_renew, created_at, updated_at \
             FROM subscriptions WHERE user_id = $1 AND device_id = $2",
        )
        .bind(user_id)
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)
    }

    /// Insert or replace the subscription for a device pair.
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_subscription(
        &self,
        user_id: &str,
        device_id: &str,
        plan_code: &str,
        plan_tier: &str,
        status: &str,
        expires_at: Option<DateTime<Utc>>,
        auto_renew: bool,
    ) -> Result<SubscriptionRow, VigilError> {
        sqlx::query_as::<_, SubscriptionRow>(
            "INSERT INTO subscriptions \
             (id, user_id, device_id, plan_code, plan_tier, status, expires_at, auto_renew, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW()) \
             ON CONFLICT (user_id, device_id) DO UPDATE SET \
                 plan_code = EXCLUDED.plan_code, plan_tier = EXCLUDED.plan_tier, \
                 status = EXCLUDED.status, expires_at = EXCLUDED.expires_at, \
                 auto_renew = EXCLUDED.auto_renew, updated_at = NOW() \
             RETURNING id, user_id, device_id, plan_code, plan_tier, status, expires_at, \
                       auto_renew, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(device_id)
        .bind(plan_code)
        .bind(plan_tier)
        .bind(status)
        .bind(expires_at)
        .bind(auto_renew)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)
    }

    // ── Billing events ───────────────────────────────────────────────────────

    pub async fn billing_event_exists(&self, event_id: &str) -> Result<bool, VigilError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM billing_events WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(count > 0)
    }

    pub async fn insert_billing_event(
        &self,
        provider: &str,
        event_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), VigilError> {
        sqlx::query(
            "INSERT INTO billing_events (id, provider, event_id, payload, created_at) \
             VALUES ($1, $2, $3, $4, NOW())",
        )
        .bind(Uuid::new_v4())
        .bind(provider)
        .bind(event_id)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}
