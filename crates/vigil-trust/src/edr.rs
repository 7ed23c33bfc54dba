use once_cell::sync::Lazy;
use std::collections::HashSet;

use vigil_core::payload::EdrReport;
use vigil_core::types::ThreatLevel;

/// Known-malware SHA-256 digests. Curated out-of-band; lowercase hex.
static MALWARE_HASH_BLACKLIST: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        "deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef",
    ])
});

/// Command-and-control domains tied to known remote-access trojans.
static RAT_DOMAINS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from(["c2.evilrat.net", "stealth.trojanc2.io"])
});

static RAT_IPS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from(["185.199.110.153", "45.67.230.12"])
});

/// Scored outcome of an endpoint-detection report.
#[derive(Debug, Clone, PartialEq)]
pub struct EdrRisk {
    pub score: i64,
    pub level: ThreatLevel,
    pub actions: Vec<String>,
    pub rat_detected: bool,
}

/// Map an EDR report to a risk score, level, and action list.
///
/// Additive heuristics: blacklisted hash +50, sideloaded app +15, SMS
/// permission +10, Accessibility +15, Device-Admin +10, the
/// sideloaded+SMS+Accessibility combo +30, RAT network contact +40. Any RAT
/// contact forces level critical with a score floor of 80.
pub fn compute_risk(report: &EdrReport) -> EdrRisk {
    let mut score: i64 = 0;
    let mut actions: Vec<String> = Vec::new();

    let sideloaded_present = report.suspicious_apps.iter().any(|a| a.sideloaded);

    for app in &report.suspicious_apps {
        if MALWARE_HASH_BLACKLIST.contains(app.hash_sha256.to_lowercase().as_str()) {
            score += 50;
            actions.push(format!("blacklist_hit:{}", app.package));
        }
        if app.sideloaded {
            score += 15;
            actions.push(format!("sideloaded:{}", app.package));
        }
    }

    let perms: HashSet<String> = report
        .dangerous_permissions
        .iter()
        .map(|p| p.to_lowercase())
        .collect();
    if perms.contains("sms") {
        score += 10;
    }
    if perms.contains("accessibility") {
        score += 15;
    }
    if perms.contains("device_admin") {
        score += 10;
    }

    // A sideloaded app holding both SMS and Accessibility is the standard
    // banking-trojan install pattern.
    if sideloaded_present && perms.contains("sms") && perms.contains("accessibility") {
        score += 30;
        actions.push("combo_sideloaded_sms_accessibility".into());
    }

    let mut rat_detected = false;
    if let Some(logs) = &report.dns_logs {
        for log in logs {
            if RAT_DOMAINS.contains(log.domain.as_str()) || RAT_IPS.contains(log.ip.as_str()) {
                score += 40;
                rat_detected = true;
                let contact = if log.domain.is_empty() { &log.ip } else { &log.domain };
                actions.push(format!("rat_contact:{contact}"));
            }
        }
    }

    if rat_detected {
        return EdrRisk {
            score: score.max(80).min(100),
            level: ThreatLevel::Critical,
            actions,
            rat_detected,
        };
    }

    let level = match score {
        s if s >= 80 => ThreatLevel::Critical,
        s if s >= 50 => ThreatLevel::High,
        s if s >= 25 => ThreatLevel::Medium,
        _ => ThreatLevel::Low,
    };

    EdrRisk { score: score.min(100), level, actions, rat_detected }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::payload::{DnsLog, SuspiciousApp};

    fn app(package: &str, hash: &str, sideloaded: bool) -> SuspiciousApp {
        SuspiciousApp {
            package: package.into(),
            hash_sha256: hash.into(),
            sideloaded,
        }
    }

    #[test]
    fn rat_contact_forces_critical_and_score_100() {
        let report = EdrReport {
            device_id: "d1".into(),
            suspicious_apps: vec![app("com.shady.apk", "0000", true)],
            dangerous_permissions: vec!["SMS".into(), "Accessibility".into()],
            dns_logs: Some(vec![DnsLog {
                domain: "c2.evilrat.net".into(),
                ip: "10.0.0.1".into(),
            }]),
        };
        let risk = compute_risk(&report);
        assert_eq!(risk.level, ThreatLevel::Critical);
        assert_eq!(risk.score, 100);
        assert!(risk.rat_detected);
        assert!(risk.actions.iter().any(|a| a == "rat_contact:c2.evilrat.net"));
        assert!(risk.actions.iter().any(|a| a == "combo_sideloaded_sms_accessibility"));
    }

    #[test]
    fn rat_ip_alone_floors_score_at_80() {
        let report = EdrReport {
            device_id: "d1".into(),
            suspicious_apps: vec![],
            dangerous_permissions: vec![],
            dns_logs: Some(vec![DnsLog {
                domain: "cdn.example.com".into(),
                ip: "45.67.230.12".into(),
            }]),
        };
        let risk = compute_risk(&report);
        assert_eq!(risk.level, ThreatLevel::Critical);
        assert_eq!(risk.score, 80);
    }

    #[test]
    fn level_thresholds() {
        let base = EdrReport {
            device_id: "d1".into(),
            suspicious_apps: vec![],
            dangerous_permissions: vec![],
            dns_logs: None,
        };
        assert_eq!(compute_risk(&base).level, ThreatLevel::Low);

        let medium = EdrReport {
            dangerous_permissions: vec!["accessibility".into(), "device_admin".into()],
            ..base.clone()
        };
        assert_eq!(compute_risk(&medium).score, 25);
        assert_eq!(compute_risk(&medium).level, ThreatLevel::Medium);

        let high = EdrReport {
            suspicious_apps: vec![app(
                "com.bad",
                "deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef",
                false,
            )],
            ..base.clone()
        };
        assert_eq!(compute_risk(&high).score, 50);
        assert_eq!(compute_risk(&high).level, ThreatLevel::High);
    }

    #[test]
    fn blacklist_match_is_case_insensitive() {
        let report = EdrReport {
            device_id: "d1".into(),
            suspicious_apps: vec![app(
                "com.bad",
                "DEADBEEFDEADBEEFDEADBEEFDEADBEEFDEADBEEFDEADBEEFDEADBEEFDEADBEEF",
                false,
            )],
            dangerous_permissions: vec![],
            dns_logs: None,
        };
        let risk = compute_risk(&report);
        assert_eq!(risk.score, 50);
        assert_eq!(risk.actions, vec!["blacklist_hit:com.bad".to_string()]);
    }
}
