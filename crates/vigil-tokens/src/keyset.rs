use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use vigil_core::error::VigilError;

/// Resolution order for verification keys:
///   1. JWKS endpoint (TTL-cached by `kid`; first key when `kid` is absent)
///   2. Configured public PEM
///   3. HMAC secret, only for HMAC-family algorithms
///
/// If none applies the token is unverifiable right now and the caller maps
/// that to 503, not 401: the token may be perfectly valid.
pub struct KeyResolver {
    algorithm: Algorithm,
    jwks_url: Option<String>,
    public_key_pem: Option<String>,
    secret: Option<String>,
    cache_ttl: Duration,
    http: reqwest::Client,
    cache: RwLock<Option<CachedJwks>>,
}

struct CachedJwks {
    fetched_at: Instant,
    jwks: JwkSet,
}

pub(crate) fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

impl KeyResolver {
    pub fn new(
        algorithm: Algorithm,
        jwks_url: Option<String>,
        jwks_cache_ttl_secs: u64,
        public_key_pem: Option<String>,
        secret: Option<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap_or_default();
        Self {
            algorithm,
            jwks_url,
            public_key_pem,
            secret,
            cache_ttl: Duration::from_secs(jwks_cache_ttl_secs),
            http,
            cache: RwLock::new(None),
        }
    }

    /// Resolve the decoding key for a token carrying `kid` in its header.
    pub async fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, VigilError> {
        if let Some(url) = &self.jwks_url {
            let jwks = self.load_jwks(url).await?;
            if let Some(kid) = kid {
                match jwks.find(kid) {
                    Some(jwk) => {
                        return DecodingKey::from_jwk(jwk)
                            .map_err(|e| VigilError::Auth(format!("unusable JWK: {e}")));
                    }
                    None => return Err(VigilError::Auth("Unknown KID".into())),
                }
            }
            // Graceful rotation: no kid in the header, take the first key.
            if let Some(jwk) = jwks.keys.first() {
                return DecodingKey::from_jwk(jwk)
                    .map_err(|e| VigilError::Auth(format!("unusable JWK: {e}")));
            }
        }

        if let Some(pem) = &self.public_key_pem {
            return decoding_key_from_pem(self.algorithm, pem);
        }

        if is_hmac(self.algorithm) {
            if let Some(secret) = &self.secret {
                return Ok(DecodingKey::from_secret(secret.as_bytes()));
            }
        }

        Err(VigilError::Unavailable("No verification key available".into()))
    }

    /// Fetch the JWKS document, serving from cache while fresh. Concurrent
    /// refreshes serialize on the write lock: the first caller fetches,
    /// the rest read the result it stored.
    async fn load_jwks(&self, url: &str) -> Result<JwkSet, VigilError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(cached.jwks.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref() {
            if cached.fetched_at.elapsed() < self.cache_ttl {
                return Ok(cached.jwks.clone());
            }
        }

        debug!(url, "refreshing JWKS cache");
        let jwks: JwkSet = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| {
                warn!(error = %e, "JWKS fetch failed");
                VigilError::Unavailable("Unable to fetch JWKS".into())
            })?
            .json()
            .await
            .map_err(|_| VigilError::Unavailable("Unable to fetch JWKS".into()))?;

        *cache = Some(CachedJwks { fetched_at: Instant::now(), jwks: jwks.clone() });
        Ok(jwks)
    }
}

/// PEM decoding per algorithm family.
fn decoding_key_from_pem(algorithm: Algorithm, pem: &str) -> Result<DecodingKey, VigilError> {
    let bytes = pem.as_bytes();
    let key = match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(bytes),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(bytes),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(bytes),
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            return Err(VigilError::Config(
                "public PEM configured with an HMAC algorithm".into(),
            ))
        }
    };
    key.map_err(|e| VigilError::Config(format!("invalid public key PEM: {e}")))
}
