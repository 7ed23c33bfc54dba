use chrono::{DateTime, Utc};
use std::collections::HashMap;

use vigil_store::SubscriptionRow;

/// The subscription fields mirrored into the coordination store so the
/// admission filter rarely touches Postgres.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSubscription {
    pub status: String,
    pub plan_tier: String,
    pub plan_code: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedSubscription {
    /// Rehydrate from a stored hash. An empty hash (or one without a
    /// plan_tier) counts as a cache miss.
    pub fn from_hash(fields: &HashMap<String, String>) -> Option<Self> {
        let plan_tier = fields.get("plan_tier").filter(|t| !t.is_empty())?;
        let expires_at = fields
            .get("expires_at")
            .filter(|v| !v.is_empty())
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Some(Self {
            status: fields.get("status").cloned().unwrap_or_else(|| "trial".into()),
            plan_tier: plan_tier.clone(),
            plan_code: fields.get("plan_code").cloned().unwrap_or_else(|| "unknown".into()),
            expires_at,
        })
    }

    /// Field pairs for HSET.
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("status", self.status.clone()),
            ("plan_tier", self.plan_tier.clone()),
            ("plan_code", self.plan_code.clone()),
            (
                "expires_at",
                self.expires_at.map(|dt| dt.to_rfc3339()).unwrap_or_default(),
            ),
        ]
    }
}

impl From<&SubscriptionRow> for CachedSubscription {
    fn from(row: &SubscriptionRow) -> Self {
        Self {
            status: row.status.clone(),
            plan_tier: row.plan_tier.clone(),
            plan_code: row.plan_code.clone(),
            expires_at: row.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_hash_fields() {
        let cached = CachedSubscription {
            status: "active".into(),
            plan_tier: "paid".into(),
            plan_code: "paid_monthly".into(),
            expires_at: Some(Utc::now()),
        };
        let map: HashMap<String, String> = cached
            .to_fields()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let back = CachedSubscription::from_hash(&map).unwrap();
        assert_eq!(back.status, "active");
        assert_eq!(back.plan_tier, "paid");
        assert!(back.expires_at.is_some());
    }

    #[test]
    fn missing_plan_tier_is_a_cache_miss() {
        assert!(CachedSubscription::from_hash(&HashMap::new()).is_none());
        let mut map = HashMap::new();
        map.insert("status".to_string(), "active".to_string());
        assert!(CachedSubscription::from_hash(&map).is_none());
    }
}
