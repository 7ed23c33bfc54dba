use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;

use vigil_core::error::VigilError;
use vigil_core::plan::{PlanTier, SubscriptionStatus};
use vigil_coord::keys;
use vigil_tokens::TokenType;

use crate::error::ApiError;
use crate::extract::bearer_token;
use crate::state::AppState;

/// Android accessibility telemetry announces itself through headers; the
/// inferred tier only raises rate limits, it never bypasses the paywall.
fn wants_accessibility_tier(headers: &HeaderMap) -> bool {
    let header_is = |name: &str, expected: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case(expected))
    };
    header_is("x-platform", "android") && header_is("x-accessibility-telemetry", "true")
}

/// Admission filter applied to every protected route.
///
/// Order: bearer verification → device binding → revocation/block markers →
/// paywall (cache first, durable on miss) → tier inference → per-plan rate
/// limit. Attaches the verified claims and plan tier to the request, and the
/// plan tier to the response as `X-Plan-Tier`.
pub async fn admission_guard(
    State(ctx): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let headers = req.headers();

    let token = bearer_token(headers)
        .ok_or_else(|| VigilError::Auth("Missing bearer token".into()))?;
    let claims = ctx.tokens.verify(&token, TokenType::Access).await?;

    let device_id = headers
        .get("x-device-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| claims.device_id.clone());
    if claims.device_id != device_id {
        return Err(VigilError::Access("Token not authorized for this device".into()).into());
    }

    if ctx.coord.exists(&keys::revoked_device_key(&device_id)).await? {
        return Err(VigilError::Access("Device revoked".into()).into());
    }
    if let Some(jti) = &claims.jti {
        if ctx.coord.exists(&keys::revoked_jti_key(jti)).await? {
            return Err(VigilError::Access("Token revoked".into()).into());
        }
    }
    if ctx.coord.get(&keys::device_state_key(&device_id)).await?.as_deref() == Some("blocked") {
        return Err(VigilError::Blocked("Device blocked".into()).into());
    }

    // ── Paywall ──────────────────────────────────────────────────────────────
    let accessibility = wants_accessibility_tier(headers);
    let cached = ctx.access.read_cached_subscription(&claims.sub, &device_id).await?;
    let (status, cached_tier) = match &cached {
        None => {
            // Cache miss: compute from durable records. New devices that
            // never attested are rejected inside this call.
            let paywall = ctx
                .access
                .compute_paywall_state(&claims.sub, &device_id, Utc::now(), None)
                .await?;
            if paywall.trial_expired && !paywall.is_premium {
                return Err(VigilError::PaymentRequired("Subscription required".into()).into());
            }
            (SubscriptionStatus::Trial, PlanTier::Trial)
        }
        Some(cached) => {
            if cached.expires_at.is_some_and(|expires| expires < Utc::now()) {
                return Err(VigilError::PaymentRequired("Subscription expired".into()).into());
            }
            let status = SubscriptionStatus::parse(&cached.status);
            if !status.admits_traffic() {
                return Err(VigilError::PaymentRequired("Subscription inactive".into()).into());
            }
            (status, PlanTier::parse(&cached.plan_tier))
        }
    };

    let plan_tier = if accessibility {
        // Trial devices get the tier upgrade only while the paywall still
        // admits them.
        if status == SubscriptionStatus::Trial {
            let paywall = ctx
                .access
                .compute_paywall_state(&claims.sub, &device_id, Utc::now(), None)
                .await?;
            if paywall.trial_expired && !paywall.is_premium {
                return Err(VigilError::PaymentRequired("Subscription required".into()).into());
            }
        }
        PlanTier::AndroidAccessibility
    } else {
        cached_tier
    };

    // ── Per-plan rate limit ──────────────────────────────────────────────────
    let limit = plan_tier.rate_limit();
    let rate_key = keys::plan_rate_key(plan_tier.as_str(), &claims.sub, &device_id);
    let count = ctx.coord.bump_counter(&rate_key, limit.window_secs).await?;
    if count > limit.limit {
        return Err(VigilError::RateLimited("Rate limit exceeded".into()).into());
    }

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(plan_tier);

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(plan_tier.as_str()) {
        response.headers_mut().insert("x-plan-tier", value);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessibility_tier_requires_both_headers() {
        let mut headers = HeaderMap::new();
        assert!(!wants_accessibility_tier(&headers));

        headers.insert("x-platform", HeaderValue::from_static("android"));
        assert!(!wants_accessibility_tier(&headers));

        headers.insert("x-accessibility-telemetry", HeaderValue::from_static("true"));
        assert!(wants_accessibility_tier(&headers));

        headers.insert("x-platform", HeaderValue::from_static("ios"));
        assert!(!wants_accessibility_tier(&headers));
    }
}
