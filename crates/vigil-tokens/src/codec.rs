use chrono::{Duration, Utc};
use jsonwebtoken::{decode, decode_header, encode, Algorithm, EncodingKey, Header, Validation};
use uuid::Uuid;

use vigil_core::error::VigilError;

use crate::claims::{TokenClaims, TokenType};
use crate::keyset::{is_hmac, KeyResolver};

/// Signs and verifies the JWS itself. Stateless apart from the JWKS cache
/// inside the resolver; the redemption bookkeeping lives in
/// [`crate::service::TokenService`].
pub struct TokenCodec {
    algorithm: Algorithm,
    secret: Option<String>,
    private_key_pem: Option<String>,
    active_kid: Option<String>,
    audience: Option<String>,
    issuer: Option<String>,
    clock_skew_secs: i64,
    resolver: KeyResolver,
}

impl TokenCodec {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        algorithm: Algorithm,
        secret: Option<String>,
        private_key_pem: Option<String>,
        public_key_pem: Option<String>,
        active_kid: Option<String>,
        audience: Option<String>,
        issuer: Option<String>,
        clock_skew_secs: i64,
        jwks_url: Option<String>,
        jwks_cache_ttl_secs: u64,
    ) -> Self {
        let resolver = KeyResolver::new(
            algorithm,
            jwks_url,
            jwks_cache_ttl_secs,
            public_key_pem,
            secret.clone(),
        );
        Self {
            algorithm,
            secret,
            private_key_pem,
            active_kid,
            audience,
            issuer,
            clock_skew_secs,
            resolver,
        }
    }

    // ── Minting ──────────────────────────────────────────────────────────────

    /// Mint a token of the given type and lifetime. Returns `(token, jti)`.
    pub fn mint(
        &self,
        user_id: &str,
        device_id: &str,
        typ: TokenType,
        ttl: Duration,
    ) -> Result<(String, String), VigilError> {
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            device_id: device_id.to_string(),
            exp: (now + ttl).timestamp(),
            typ: typ.as_str().to_string(),
            iat: Some(now.timestamp()),
            nbf: Some(now.timestamp()),
            jti: Some(jti.clone()),
            aud: self.audience.clone().map(serde_json::Value::String),
            iss: self.issuer.clone(),
        };

        let mut header = Header::new(self.algorithm);
        header.kid = self.active_kid.clone();

        let token = encode(&header, &claims, &self.encoding_key()?)
            .map_err(|e| VigilError::Internal(format!("token signing failed: {e}")))?;
        Ok((token, jti))
    }

    fn encoding_key(&self) -> Result<EncodingKey, VigilError> {
        if let Some(pem) = &self.private_key_pem {
            let key = match self.algorithm {
                Algorithm::RS256
                | Algorithm::RS384
                | Algorithm::RS512
                | Algorithm::PS256
                | Algorithm::PS384
                | Algorithm::PS512 => EncodingKey::from_rsa_pem(pem.as_bytes()),
                Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem.as_bytes()),
                Algorithm::EdDSA => EncodingKey::from_ed_pem(pem.as_bytes()),
                Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                    return Err(VigilError::Config(
                        "private PEM configured with an HMAC algorithm".into(),
                    ))
                }
            };
            return key.map_err(|e| VigilError::Config(format!("invalid private key PEM: {e}")));
        }
        if is_hmac(self.algorithm) {
            if let Some(secret) = &self.secret {
                return Ok(EncodingKey::from_secret(secret.as_bytes()));
            }
        }
        Err(VigilError::Config("no signing key configured".into()))
    }

    // ── Verification ─────────────────────────────────────────────────────────

    /// Verify signature, expiry, `aud`/`iss` when configured, the expected
    /// token type, and `nbf`/`iat` against the configured clock skew.
    pub async fn verify(
        &self,
        token: &str,
        expected: TokenType,
    ) -> Result<TokenClaims, VigilError> {
        let header =
            decode_header(token).map_err(|_| VigilError::Auth("Invalid token header".into()))?;
        let key = self.resolver.decoding_key(header.kid.as_deref()).await?;

        let mut validation = Validation::new(self.algorithm);
        validation.leeway = self.clock_skew_secs.max(0) as u64;
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        if let Some(iss) = &self.issuer {
            validation.set_issuer(&[iss]);
        }

        let claims = decode::<TokenClaims>(token, &key, &validation)
            .map_err(|_| VigilError::Auth("Token verification failed".into()))?
            .claims;

        if claims.typ != expected.as_str() {
            return Err(VigilError::Auth("Unexpected token type".into()));
        }

        // nbf/iat are checked manually so the skew rule is ours, not the
        // library default's.
        let now = Utc::now().timestamp();
        let leeway = self.clock_skew_secs.max(0);
        if claims.nbf.is_some_and(|nbf| nbf - leeway > now) {
            return Err(VigilError::Auth("Token not yet valid".into()));
        }
        if claims.iat.is_some_and(|iat| iat - leeway > now) {
            return Err(VigilError::Auth("Token issued in the future".into()));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hs_codec() -> TokenCodec {
        TokenCodec::new(
            Algorithm::HS256,
            Some("unit-test-secret".into()),
            None,
            None,
            Some("kid-1".into()),
            Some("vigil-mobile".into()),
            Some("vigil".into()),
            30,
            None,
            300,
        )
    }

    #[tokio::test]
    async fn access_token_round_trip() {
        let codec = hs_codec();
        let (token, jti) = codec
            .mint("user123", "deviceA", TokenType::Access, Duration::minutes(15))
            .unwrap();
        let claims = codec.verify(&token, TokenType::Access).await.unwrap();
        assert_eq!(claims.sub, "user123");
        assert_eq!(claims.device_id, "deviceA");
        assert_eq!(claims.typ, "access");
        assert_eq!(claims.jti.as_deref(), Some(jti.as_str()));
        assert_eq!(claims.iss.as_deref(), Some("vigil"));
    }

    #[tokio::test]
    async fn typ_is_enforced() {
        let codec = hs_codec();
        let (token, _) = codec
            .mint("user123", "deviceA", TokenType::Access, Duration::minutes(15))
            .unwrap();
        let err = codec.verify(&token, TokenType::Refresh).await.unwrap_err();
        assert!(matches!(err, VigilError::Auth(_)));
    }

    #[tokio::test]
    async fn future_iat_is_rejected() {
        let codec = hs_codec();
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: "u".into(),
            device_id: "d".into(),
            exp: now + 300,
            typ: "access".into(),
            iat: Some(now + 120), // beyond the 30 s skew
            nbf: Some(now),
            jti: Some("j".into()),
            aud: Some(serde_json::Value::String("vigil-mobile".into())),
            iss: Some("vigil".into()),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"unit-test-secret"),
        )
        .unwrap();
        let err = codec.verify(&token, TokenType::Access).await.unwrap_err();
        assert!(matches!(err, VigilError::Auth(_)));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let codec = hs_codec();
        let (token, _) = codec
            .mint("user123", "deviceA", TokenType::Access, Duration::minutes(-5))
            .unwrap();
        let err = codec.verify(&token, TokenType::Access).await.unwrap_err();
        assert!(matches!(err, VigilError::Auth(_)));
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let codec = hs_codec();
        let other = TokenCodec::new(
            Algorithm::HS256,
            Some("unit-test-secret".into()),
            None,
            None,
            None,
            Some("someone-else".into()),
            Some("vigil".into()),
            30,
            None,
            300,
        );
        let (token, _) = other
            .mint("user123", "deviceA", TokenType::Access, Duration::minutes(15))
            .unwrap();
        let err = codec.verify(&token, TokenType::Access).await.unwrap_err();
        assert!(matches!(err, VigilError::Auth(_)));
    }
}
