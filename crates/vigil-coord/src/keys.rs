//! Coordination-store key layout.
//!
//!   refresh:<user>:<device>:<jti>:<fp_hash>  — "1", TTL = session TTL
//!   device:<device>:state                    — "blocked" | absent
//!   revoked:device:<device>                  — "1", TTL 1 h
//!   revoked:jti:<jti>                        — "1", TTL 1 h
//!   force_overlay:<device>                   — "1", TTL 1 h
//!   baseline:<device>                        — hash {mean, m2, count, std}
//!   sig:<device>                             — list of serialized payloads, newest first
//!   decision:<device>                        — last published trust score
//!   trust_hist:<device>                      — list of recent scores
//!   trust_diag:<device>                      — hash of last-run diagnostics
//!   sub:<user>:<device>                      — cached subscription hash
//!   rl:<tier>:<user>:<device>                — plan-tier request counter
//!   refresh_rl:<device>                      — refresh-attempt counter
//!   ws:conn:<ip>:<device>                    — push-socket connection counter

/// Analyzer job queue (list; producers RPUSH, workers BLPOP).
pub const ANALYZER_QUEUE_KEY: &str = "analyzer:jobs";

/// Rolling analyzer runtime samples in milliseconds, newest first.
pub const RUNTIME_SAMPLES_KEY: &str = "metrics:analyzer:runtime_ms";

pub fn refresh_key(user_id: &str, device_id: &str, jti: &str, fp_hash: &str) -> String {
    format!("refresh:{user_id}:{device_id}:{jti}:{fp_hash}")
}

/// Glob matching every refresh record for a device, whatever jti/fingerprint.
pub fn refresh_pattern(user_id: &str, device_id: &str) -> String {
    format!("refresh:{user_id}:{device_id}:*")
}

pub fn device_state_key(device_id: &str) -> String {
    format!("device:{device_id}:state")
}

pub fn revoked_device_key(device_id: &str) -> String {
    format!("revoked:device:{device_id}")
}

pub fn revoked_jti_key(jti: &str) -> String {
    format!("revoked:jti:{jti}")
}

pub fn force_overlay_key(device_id: &str) -> String {
    format!("force_overlay:{device_id}")
}

pub fn baseline_key(device_id: &str) -> String {
    format!("baseline:{device_id}")
}

pub fn recent_payload_key(device_id: &str) -> String {
    format!("sig:{device_id}")
}

pub fn decision_key(device_id: &str) -> String {
    format!("decision:{device_id}")
}

pub fn trust_hist_key(device_id: &str) -> String {
    format!("trust_hist:{device_id}")
}

pub fn trust_diag_key(device_id: &str) -> String {
    format!("trust_diag:{device_id}")
}

pub fn sub_cache_key(user_id: &str, device_id: &str) -> String {
    format!("sub:{user_id}:{device_id}")
}

pub fn plan_rate_key(tier: &str, user_id: &str, device_id: &str) -> String {
    format!("rl:{tier}:{user_id}:{device_id}")
}

pub fn refresh_rate_key(device_id: &str) -> String {
    format!("refresh_rl:{device_id}")
}

pub fn ws_conn_rate_key(client_ip: &str, device_id: &str) -> String {
    format!("ws:conn:{client_ip}:{device_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_key_encodes_all_identity_parts() {
        let key = refresh_key("u1", "d1", "jti-9", "abcd");
        assert_eq!(key, "refresh:u1:d1:jti-9:abcd");
        // The device-wide pattern must match any jti/fingerprint suffix.
        assert!(key.starts_with(&refresh_pattern("u1", "d1").trim_end_matches('*').to_string()));
    }

    #[test]
    fn per_device_keys() {
        assert_eq!(device_state_key("d1"), "device:d1:state");
        assert_eq!(revoked_device_key("d1"), "revoked:device:d1");
        assert_eq!(force_overlay_key("d1"), "force_overlay:d1");
        assert_eq!(recent_payload_key("d1"), "sig:d1");
        assert_eq!(decision_key("d1"), "decision:d1");
    }
}
