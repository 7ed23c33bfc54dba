use serde::{Deserialize, Serialize};

// ── Sensor heartbeat payload ─────────────────────────────────────────────────

/// One sensor sample streamed by the on-device agent.
///
/// This is the strongly-shaped in-process form; the durable row stores the
/// same fields as JSON. Raw maps never cross component boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorPayload {
    pub accelerometer: [f64; 3],
    pub gyroscope: [f64; 3],
    /// Fraction of the screen covered by a foreign overlay, in [0, 1].
    pub overlay: f64,
    pub proximity: f64,
    #[serde(default)]
    pub touch_event: bool,
    #[serde(default)]
    pub motion_delta: f64,
    #[serde(default = "default_true")]
    pub device_admin_enabled: bool,
    #[serde(default = "default_true")]
    pub accessibility_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl SensorPayload {
    /// L1 magnitude of the accelerometer vector.
    pub fn accel_magnitude(&self) -> f64 {
        self.accelerometer.iter().map(|x| x.abs()).sum()
    }

    /// L1 magnitude of the gyroscope vector.
    pub fn gyro_magnitude(&self) -> f64 {
        self.gyroscope.iter().map(|x| x.abs()).sum()
    }
}

// ── EDR report ───────────────────────────────────────────────────────────────

/// An application the on-device agent considers suspicious.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousApp {
    pub package: String,
    pub hash_sha256: String,
    #[serde(default)]
    pub sideloaded: bool,
}

/// A DNS resolution observed by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsLog {
    pub domain: String,
    pub ip: String,
}

/// Endpoint-detection report submitted by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdrReport {
    pub device_id: String,
    #[serde(default)]
    pub suspicious_apps: Vec<SuspiciousApp>,
    #[serde(default)]
    pub dangerous_permissions: Vec<String>,
    pub dns_logs: Option<Vec<DnsLog>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_defaults_fill_missing_fields() {
        let json = r#"{
            "accelerometer": [0.1, 0.2, 0.3],
            "gyroscope": [0.0, 0.0, 0.1],
            "overlay": 0.0,
            "proximity": 1.0
        }"#;
        let p: SensorPayload = serde_json::from_str(json).unwrap();
        assert!(!p.touch_event);
        assert_eq!(p.motion_delta, 0.0);
        assert!(p.device_admin_enabled);
        assert!(p.accessibility_enabled);
    }

    #[test]
    fn magnitudes_are_l1_norms() {
        let p = SensorPayload {
            accelerometer: [-1.0, 2.0, -3.0],
            gyroscope: [0.5, 0.0, 0.5],
            overlay: 0.0,
            proximity: 0.0,
            touch_event: false,
            motion_delta: 0.0,
            device_admin_enabled: true,
            accessibility_enabled: true,
        };
        assert_eq!(p.accel_magnitude(), 6.0);
        assert_eq!(p.gyro_magnitude(), 1.0);
    }
}
