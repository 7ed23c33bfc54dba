use chrono::Duration;
use jsonwebtoken::Algorithm;
use serde::Serialize;
use tracing::{info, warn};

use vigil_core::constants::{
    BLOCK_TTL_SECS, KILL_SWITCH_CHANNEL, REFRESH_RATE_LIMIT_MAX, REFRESH_RATE_LIMIT_WINDOW_SECS,
};
use vigil_core::error::VigilError;
use vigil_coord::keys;
use vigil_coord::CoordClient;

use crate::claims::{TokenClaims, TokenType};
use crate::codec::TokenCodec;
use crate::fingerprint::fingerprint_hash;

/// Everything the token subsystem needs from the environment.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub algorithm: Algorithm,
    pub secret: Option<String>,
    pub private_key_pem: Option<String>,
    pub public_key_pem: Option<String>,
    pub active_kid: Option<String>,
    pub audience: Option<String>,
    pub issuer: Option<String>,
    pub clock_skew_secs: i64,
    pub jwks_url: Option<String>,
    pub jwks_cache_ttl_secs: u64,
    pub access_ttl_mins: i64,
    pub refresh_base_ttl_mins: i64,
    pub refresh_extend_mins: i64,
    pub refresh_max_ttl_mins: i64,
    pub fp_secret: String,
}

/// A freshly minted access + refresh pair.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issue, verify, rotate, and revoke tokens for `(user, device)` pairs.
pub struct TokenService {
    codec: TokenCodec,
    config: TokenConfig,
    coord: CoordClient,
}

impl TokenService {
    pub fn new(config: TokenConfig, coord: CoordClient) -> Self {
        let codec = TokenCodec::new(
            config.algorithm,
            config.secret.clone(),
            config.private_key_pem.clone(),
            config.public_key_pem.clone(),
            config.active_kid.clone(),
            config.audience.clone(),
            config.issuer.clone(),
            config.clock_skew_secs,
            config.jwks_url.clone(),
            config.jwks_cache_ttl_secs,
        );
        Self { codec, config, coord }
    }

    // ── Verification ─────────────────────────────────────────────────────────

    /// JWS verification only (signature, expiry, typ, aud/iss, skew).
    pub async fn verify(
        &self,
        token: &str,
        expected: TokenType,
    ) -> Result<TokenClaims, VigilError> {
        self.codec.verify(token, expected).await
    }

    /// Full verification: the JWS checks plus the device- and jti-level
    /// revocation markers. This is what every request boundary uses.
    pub async fn verify_with_revocation(
        &self,
        token: &str,
        expected: TokenType,
    ) -> Result<TokenClaims, VigilError> {
        let claims = self.codec.verify(token, expected).await?;
        if self.coord.exists(&keys::revoked_device_key(&claims.device_id)).await? {
            return Err(VigilError::Access("Device revoked".into()));
        }
        if let Some(jti) = &claims.jti {
            if self.coord.exists(&keys::revoked_jti_key(jti)).await? {
                return Err(VigilError::Access("Token revoked".into()));
            }
        }
        Ok(claims)
    }

    // ── Issue / rotate ───────────────────────────────────────────────────────

    /// Mint a fresh access + refresh pair bound to `fingerprint`, storing the
    /// refresh record at its base TTL.
    pub async fn issue_pair(
        &self,
        user_id: &str,
        device_id: &str,
        fingerprint: &str,
    ) -> Result<TokenPair, VigilError> {
        let base_ttl_secs = self.config.refresh_base_ttl_mins * 60;
        self.issue_with_refresh_ttl(user_id, device_id, fingerprint, base_ttl_secs).await
    }

    async fn issue_with_refresh_ttl(
        &self,
        user_id: &str,
        device_id: &str,
        fingerprint: &str,
        refresh_ttl_secs: i64,
    ) -> Result<TokenPair, VigilError> {
        let (access_token, _) = self.codec.mint(
            user_id,
            device_id,
            TokenType::Access,
            Duration::minutes(self.config.access_ttl_mins),
        )?;
        let (refresh_token, jti) = self.codec.mint(
            user_id,
            device_id,
            TokenType::Refresh,
            Duration::seconds(refresh_ttl_secs),
        )?;

        let fp_hash = fingerprint_hash(&self.config.fp_secret, fingerprint);
        let key = keys::refresh_key(user_id, device_id, &jti, &fp_hash);
        self.coord.set_ex(&key, "1", refresh_ttl_secs.max(1) as u64).await?;

        Ok(TokenPair { access_token, refresh_token })
    }

    /// Redeem a refresh token. Single-use: the stored record is atomically
    /// deleted, and a second redemption of the same jti (or a redemption
    /// with the wrong fingerprint) marks the whole device revoked.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        fingerprint: &str,
    ) -> Result<TokenPair, VigilError> {
        let claims = self.codec.verify(refresh_token, TokenType::Refresh).await?;
        let jti = claims
            .jti
            .as_deref()
            .ok_or_else(|| VigilError::Auth("Invalid refresh token".into()))?;

        let gate = keys::refresh_rate_key(&claims.device_id);
        let attempts = self.coord.bump_counter(&gate, REFRESH_RATE_LIMIT_WINDOW_SECS).await?;
        if attempts > REFRESH_RATE_LIMIT_MAX {
            return Err(VigilError::RateLimited("Too many refresh attempts".into()));
        }

        let fp_hash = fingerprint_hash(&self.config.fp_secret, fingerprint);
        let key = keys::refresh_key(&claims.sub, &claims.device_id, jti, &fp_hash);

        // TTL -2 means the record is gone: either this jti was already
        // redeemed or the fingerprint does not match. Both are hostile.
        let current_ttl = self.coord.ttl_secs(&key).await?;
        if current_ttl == -2 {
            self.mark_device_revoked(&claims.device_id).await?;
            warn!(device_id = %claims.device_id, "refresh replay or fingerprint mismatch");
            return Err(VigilError::Access("Refresh token revoked".into()));
        }

        // The atomic delete is the single-use gate: exactly one concurrent
        // redemption sees count 1.
        if self.coord.del_count(&key).await? == 0 {
            self.mark_device_revoked(&claims.device_id).await?;
            warn!(device_id = %claims.device_id, "refresh token lost the redemption race");
            return Err(VigilError::Access("Refresh token revoked".into()));
        }

        let new_ttl = sliding_ttl(
            current_ttl.max(0),
            self.config.refresh_base_ttl_mins * 60,
            self.config.refresh_extend_mins * 60,
            self.config.refresh_max_ttl_mins * 60,
        );
        self.issue_with_refresh_ttl(&claims.sub, &claims.device_id, fingerprint, new_ttl).await
    }

    async fn mark_device_revoked(&self, device_id: &str) -> Result<(), VigilError> {
        self.coord
            .set_ex(&keys::revoked_device_key(device_id), "1", BLOCK_TTL_SECS)
            .await
    }

    // ── Revoke-and-block ─────────────────────────────────────────────────────

    /// Revoke every credential for the pair and push the device into the
    /// blocked state for an hour. With `publish_block`, also announce
    /// `block:<device>:logout` on the kill-switch channel so live push
    /// sockets force the on-device overlay lock immediately.
    pub async fn revoke_and_block(
        &self,
        user_id: &str,
        device_id: &str,
        publish_block: bool,
    ) -> Result<(), VigilError> {
        let removed = self.coord.scan_delete(&keys::refresh_pattern(user_id, device_id)).await?;
        self.coord
            .set_ex(&keys::device_state_key(device_id), "blocked", BLOCK_TTL_SECS)
            .await?;
        self.coord
            .set_ex(&keys::revoked_device_key(device_id), "1", BLOCK_TTL_SECS)
            .await?;
        self.coord
            .set_ex(&keys::force_overlay_key(device_id), "1", BLOCK_TTL_SECS)
            .await?;
        if publish_block {
            self.coord
                .publish(KILL_SWITCH_CHANNEL, &format!("block:{device_id}:logout"))
                .await?;
        }
        info!(user_id, device_id, refresh_records_removed = removed, "device revoked and blocked");
        Ok(())
    }
}

/// Sliding refresh TTL: never below the base, extended on every successful
/// rotation, hard-capped so a busy device cannot stay signed in forever.
fn sliding_ttl(current_secs: i64, base_secs: i64, extend_secs: i64, max_secs: i64) -> i64 {
    max_secs.min(base_secs.max(current_secs + extend_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = 24 * 3600;

    #[test]
    fn sliding_ttl_never_drops_below_base() {
        // A nearly expired record still comes back at the base TTL.
        assert_eq!(sliding_ttl(100, 7 * DAY, DAY, 30 * DAY), 7 * DAY);
    }

    #[test]
    fn sliding_ttl_extends_and_caps() {
        let extended = sliding_ttl(10 * DAY, 7 * DAY, DAY, 30 * DAY);
        assert_eq!(extended, 11 * DAY);
        let capped = sliding_ttl(30 * DAY, 7 * DAY, DAY, 30 * DAY);
        assert_eq!(capped, 30 * DAY);
    }
}
