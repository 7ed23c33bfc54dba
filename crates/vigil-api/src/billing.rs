use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use vigil_core::error::VigilError;
use vigil_store::SubscriptionRow;

use crate::error::ApiError;
use crate::extract::{assert_device_access, CurrentClaims};
use crate::state::AppState;
use crate::types::{BillingStatusIn, BillingStatusOut, BillingWebhookIn, DeviceQuery, SubscriptionOut};

type HmacSha256 = Hmac<Sha256>;

fn subscription_out(row: &SubscriptionRow) -> SubscriptionOut {
    SubscriptionOut {
        user_id: row.user_id.clone(),
        device_id: row.device_id.clone(),
        plan_code: row.plan_code.clone(),
        status: row.status.clone(),
        plan_tier: row.plan_tier.clone(),
        expires_at: row.expires_at,
    }
}

/// The webhook is authenticated by an HMAC over the raw body, not by a
/// bearer token.
fn verify_signature(secret: &str, signature: Option<&str>, body: &[u8]) -> Result<(), VigilError> {
    let Some(signature) = signature else {
        return Err(VigilError::Integrity("Missing signature".into()));
    };
    let provided =
        hex::decode(signature).map_err(|_| VigilError::Integrity("Invalid signature".into()))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| VigilError::Config("billing webhook secret unusable".into()))?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| VigilError::Integrity("Invalid signature".into()))
}

// ── Webhook ──────────────────────────────────────────────────────────────────

/// Billing-provider webhook: signature-checked, idempotent by `event_id`.
/// A duplicate event answers with the current subscription state and applies
/// no side effects.
pub async fn webhook(
    State(ctx): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SubscriptionOut>, ApiError> {
    let signature = headers.get("x-signature").and_then(|v| v.to_str().ok());
    verify_signature(&ctx.config.billing_webhook_secret, signature, &body)?;

    let event: BillingWebhookIn = serde_json::from_slice(&body)
        .map_err(|e| VigilError::Serialization(e.to_string()))?;

    if ctx.store.billing_event_exists(&event.event_id).await? {
        let sub = ctx
            .store
            .get_subscription(&event.user_id, &event.device_id)
            .await?
            .ok_or_else(|| VigilError::NotFound("Subscription not found".into()))?;
        return Ok(Json(subscription_out(&sub)));
    }

    ctx.store
        .insert_billing_event(&event.provider, &event.event_id, &event.payload)
        .await?;

    let expires_at = event.expires_at.unwrap_or_else(|| Utc::now() + Duration::days(7));
    let sub = ctx
        .store
        .upsert_subscription(
            &event.user_id,
            &event.device_id,
            &event.plan_code,
            &event.plan_tier,
            &event.status,
            Some(expires_at),
            event.auto_renew,
        )
        .await?;

    ctx.access.prime_subscription_cache(&sub).await?;
    Ok(Json(subscription_out(&sub)))
}

// ── Subscription read path ───────────────────────────────────────────────────

/// Subscription state, served from the cache when warm.
pub async fn subscription(
    State(ctx): State<AppState>,
    CurrentClaims(claims): CurrentClaims,
    Query(query): Query<DeviceQuery>,
) -> Result<Json<SubscriptionOut>, ApiError> {
    assert_device_access(&query.device_id, &claims)?;

    if let Some(cached) = ctx
        .access
        .read_cached_subscription(&claims.sub, &query.device_id)
        .await?
    {
        return Ok(Json(SubscriptionOut {
            user_id: claims.sub,
            device_id: query.device_id,
            plan_code: cached.plan_code,
            status: cached.status,
            plan_tier: cached.plan_tier,
            expires_at: cached.expires_at,
        }));
    }

    let sub = ctx
        .access
        .get_subscription(&claims.sub, &query.device_id)
        .await?
        .ok_or_else(|| VigilError::NotFound("Subscription not found".into()))?;
    ctx.access.prime_subscription_cache(&sub).await?;
    Ok(Json(subscription_out(&sub)))
}

/// Paywall state for the device; also the entry point where a new device
/// presents its attestation.
pub async fn status(
    State(ctx): State<AppState>,
    CurrentClaims(claims): CurrentClaims,
    Json(body): Json<BillingStatusIn>,
) -> Result<Json<BillingStatusOut>, ApiError> {
    assert_device_access(&body.device_id, &claims)?;

    let now = Utc::now();
    let paywall = ctx
        .access
        .compute_paywall_state(&claims.sub, &body.device_id, now, body.attestation.as_ref())
        .await?;
    if paywall.trial_expired && !paywall.is_premium {
        return Err(VigilError::PaymentRequired("Payment required".into()).into());
    }

    Ok(Json(BillingStatusOut {
        user_id: claims.sub,
        device_id: body.device_id,
        is_premium: paywall.is_premium,
        trial_expired: paywall.trial_expired,
        trial_started_at: paywall.trial_started_at,
        now,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn signature_round_trip() {
        let body = br#"{"event_id":"evt-1"}"#;
        let sig = sign("hook-secret", body);
        assert!(verify_signature("hook-secret", Some(&sig), body).is_ok());
    }

    #[test]
    fn signature_rejects_tampering() {
        let body = br#"{"event_id":"evt-1"}"#;
        let sig = sign("hook-secret", body);
        assert!(verify_signature("hook-secret", None, body).is_err());
        assert!(verify_signature("hook-secret", Some("zz-not-hex"), body).is_err());
        assert!(verify_signature("hook-secret", Some(&sig), b"{}").is_err());
        assert!(verify_signature("other-secret", Some(&sig), body).is_err());
    }
}
