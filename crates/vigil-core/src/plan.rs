use serde::{Deserialize, Serialize};
use std::fmt;

// ── PlanTier ─────────────────────────────────────────────────────────────────

/// Subscription tier driving per-plan rate limits.
///
/// `AndroidAccessibility` is special: it can be inferred from request headers
/// (`X-Platform: android` + `X-Accessibility-Telemetry: true`) to raise the
/// rate ceiling for accessibility telemetry, but header inference never
/// bypasses the paywall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    Trial,
    PaidBasic,
    Paid,
    AndroidAccessibility,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Trial => "trial",
            PlanTier::PaidBasic => "paid_basic",
            PlanTier::Paid => "paid",
            PlanTier::AndroidAccessibility => "android_accessibility",
        }
    }

    /// Unknown tiers fall back to trial limits rather than erroring: a stale
    /// cache entry must not lock a paying device out.
    pub fn parse(s: &str) -> Self {
        match s {
            "paid_basic" => PlanTier::PaidBasic,
            "paid" => PlanTier::Paid,
            "android_accessibility" => PlanTier::AndroidAccessibility,
            _ => PlanTier::Trial,
        }
    }

    /// Requests allowed per window for this tier.
    pub fn rate_limit(&self) -> RateLimit {
        let limit = match self {
            PlanTier::Trial => 120,
            PlanTier::PaidBasic => 600,
            PlanTier::Paid => 1200,
            PlanTier::AndroidAccessibility => 1800,
        };
        RateLimit { limit, window_secs: 60 }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A counter ceiling over a fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit: i64,
    pub window_secs: i64,
}

// ── SubscriptionStatus ───────────────────────────────────────────────────────

/// Lifecycle state of a subscription row. Only the billing-webhook path
/// mutates this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    PastDue,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            "cancelled" => SubscriptionStatus::Cancelled,
            _ => SubscriptionStatus::Trial,
        }
    }

    /// Whether requests may pass the admission filter under this status.
    pub fn admits_traffic(&self) -> bool {
        matches!(self, SubscriptionStatus::Trial | SubscriptionStatus::Active)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_rate_limits_are_ordered() {
        let tiers = [
            PlanTier::Trial,
            PlanTier::PaidBasic,
            PlanTier::Paid,
            PlanTier::AndroidAccessibility,
        ];
        let limits: Vec<i64> = tiers.iter().map(|t| t.rate_limit().limit).collect();
        assert_eq!(limits, vec![120, 600, 1200, 1800]);
        assert!(limits.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn unknown_tier_falls_back_to_trial() {
        assert_eq!(PlanTier::parse("gold"), PlanTier::Trial);
        assert_eq!(PlanTier::parse("paid"), PlanTier::Paid);
    }

    #[test]
    fn only_trial_and_active_admit_traffic() {
        assert!(SubscriptionStatus::Trial.admits_traffic());
        assert!(SubscriptionStatus::Active.admits_traffic());
        assert!(!SubscriptionStatus::PastDue.admits_traffic());
        assert!(!SubscriptionStatus::Cancelled.admits_traffic());
    }
}
