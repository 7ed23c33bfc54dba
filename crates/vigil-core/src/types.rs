use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── ThreatLevel ──────────────────────────────────────────────────────────────

/// Severity recorded in the audit log. `Low` findings are reported to the
/// caller but never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "low",
            ThreatLevel::Medium => "medium",
            ThreatLevel::High => "high",
            ThreatLevel::Critical => "critical",
        }
    }

    /// Levels that warrant a durable audit entry.
    pub fn is_auditable(&self) -> bool {
        matches!(self, ThreatLevel::High | ThreatLevel::Critical)
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── AttestationRecord ────────────────────────────────────────────────────────

/// Outcome of platform attestation, stored with the device registration on
/// first contact. Immutable once `verified_at` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationRecord {
    pub attestation_type: String,
    pub nonce: String,
    /// SHA-256 hex of the attested public key (or certificate digest).
    pub public_key_hash: String,
    pub verified_at: DateTime<Utc>,
    pub risk_reason: Option<String>,
}
