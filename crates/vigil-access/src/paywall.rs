use chrono::{DateTime, Duration, Utc};
use tracing::info;

use vigil_core::constants::{SUB_CACHE_TTL_SECS, TRIAL_PERIOD_DAYS};
use vigil_core::error::VigilError;
use vigil_coord::{keys, CoordClient};
use vigil_store::{DeviceRegistrationRow, Store, SubscriptionRow};

use crate::attestation::{AttestationPayload, AttestationVerifier};
use crate::cache::CachedSubscription;

/// The paywall decision for one `(user, device)` pair at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaywallState {
    pub is_premium: bool,
    pub trial_expired: bool,
    pub trial_started_at: DateTime<Utc>,
}

/// A subscription is premium-active iff its status is `active` and it has
/// not expired. Absent rows are never premium.
pub fn is_premium(sub: Option<&SubscriptionRow>, now: DateTime<Utc>) -> bool {
    match sub {
        Some(sub) if sub.status == "active" => {
            sub.expires_at.map_or(true, |expires| expires > now)
        }
        _ => false,
    }
}

/// Computes paywall state from durable records and manages the device
/// registration that anchors the trial clock.
pub struct AccessService {
    store: Store,
    coord: CoordClient,
    verifier: AttestationVerifier,
}

impl AccessService {
    pub fn new(store: Store, coord: CoordClient, verifier: AttestationVerifier) -> Self {
        Self { store, coord, verifier }
    }

    /// Fetch the registration for the pair, creating it on first attested
    /// contact. A registration whose attestation is still pending may be
    /// filled in exactly once.
    pub async fn ensure_registration(
        &self,
        user_id: &str,
        device_id: &str,
        attestation: Option<&AttestationPayload>,
    ) -> Result<DeviceRegistrationRow, VigilError> {
        if let Some(existing) = self.store.get_registration(user_id, device_id).await? {
            if let (Some(payload), None) = (attestation, existing.verified_at) {
                let record = self.verifier.validate(payload).await?;
                self.store.fill_attestation(existing.id, &record).await?;
                info!(user_id, device_id, "late attestation recorded");
                return self
                    .store
                    .get_registration(user_id, device_id)
                    .await?
                    .ok_or_else(|| VigilError::Storage("registration vanished".into()));
            }
            return Ok(existing);
        }

        let Some(payload) = attestation else {
            return Err(VigilError::Access("Attestation required for new device".into()));
        };
        let record = self.verifier.validate(payload).await?;
        let created = self.store.insert_registration(user_id, device_id, &record).await?;
        info!(user_id, device_id, attestation_type = %record.attestation_type, "device registered");
        Ok(created)
    }

    /// The full paywall computation against durable storage.
    pub async fn compute_paywall_state(
        &self,
        user_id: &str,
        device_id: &str,
        now: DateTime<Utc>,
        attestation: Option<&AttestationPayload>,
    ) -> Result<PaywallState, VigilError> {
        let registration = self.ensure_registration(user_id, device_id, attestation).await?;
        let sub = self.store.get_subscription(user_id, device_id).await?;
        Ok(PaywallState {
            is_premium: is_premium(sub.as_ref(), now),
            trial_expired: now - registration.created_at > Duration::days(TRIAL_PERIOD_DAYS),
            trial_started_at: registration.created_at,
        })
    }

    // ── Subscription cache ───────────────────────────────────────────────────

    pub async fn read_cached_subscription(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<CachedSubscription>, VigilError> {
        let fields = self.coord.hgetall(&keys::sub_cache_key(user_id, device_id)).await?;
        Ok(CachedSubscription::from_hash(&fields))
    }

    pub async fn prime_subscription_cache(
        &self,
        sub: &SubscriptionRow,
    ) -> Result<(), VigilError> {
        let key = keys::sub_cache_key(&sub.user_id, &sub.device_id);
        let cached = CachedSubscription::from(sub);
        self.coord.hset_all(&key, &cached.to_fields()).await?;
        self.coord.expire(&key, SUB_CACHE_TTL_SECS).await
    }

    /// Durable subscription row, bypassing the cache.
    pub async fn get_subscription(
        &self,
        user_id: &str,
        device_id: &str,
    ) -> Result<Option<SubscriptionRow>, VigilError> {
        self.store.get_subscription(user_id, device_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sub(status: &str, expires_at: Option<DateTime<Utc>>) -> SubscriptionRow {
        let now = Utc::now();
        SubscriptionRow {
            id: Uuid::new_v4(),
            user_id: "u1".into(),
            device_id: "d1".into(),
            plan_code: "paid_monthly".into(),
            plan_tier: "paid".into(),
            status: status.into(),
            expires_at,
            auto_renew: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn premium_requires_active_and_unexpired() {
        let now = Utc::now();
        assert!(!is_premium(None, now));
        assert!(!is_premium(Some(&sub("trial", None)), now));
        assert!(!is_premium(Some(&sub("cancelled", None)), now));
        assert!(is_premium(Some(&sub("active", None)), now));
        assert!(is_premium(Some(&sub("active", Some(now + Duration::days(1)))), now));
        assert!(!is_premium(Some(&sub("active", Some(now - Duration::seconds(1)))), now));
    }
}
