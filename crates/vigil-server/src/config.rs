use std::str::FromStr;

use jsonwebtoken::Algorithm;

use vigil_core::error::VigilError;
use vigil_tokens::TokenConfig;

fn required(name: &str) -> Result<String, VigilError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| VigilError::Config(format!("{name} is required")))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn optional_parsed<T: FromStr>(name: &str, default: T) -> Result<T, VigilError> {
    match optional(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| VigilError::Config(format!("{name} is not a valid number"))),
        None => Ok(default),
    }
}

fn csv(name: &str) -> Vec<String> {
    optional(name)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Complete environment-driven configuration. Anything missing or malformed
/// here is unrecoverable: the binary exits nonzero instead of limping along.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub database_url: String,
    pub redis_url: String,
    pub billing_webhook_secret: String,
    pub cors_origins: Vec<String>,
    pub ws_allowed_origins: Vec<String>,
    pub ws_rate_limit_window_secs: i64,
    pub ws_rate_limit_max: i64,
    pub analyzer_queue_depth_limit: i64,
    pub analyzer_p95_limit_ms: u64,
    pub analyzer_workers: Option<usize>,
    pub play_integrity_api_key: Option<String>,
    pub app_attest_validator_url: Option<String>,
    pub jwks_document: Option<serde_json::Value>,
    pub tokens: TokenConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, VigilError> {
        let environment = optional("ENVIRONMENT").unwrap_or_else(|| "development".into());

        let redis_url = required("REDIS_URL")?;
        if environment != "development" && !redis_url.starts_with("rediss://") {
            return Err(VigilError::Config(
                "REDIS_URL must use TLS (rediss://) outside development".into(),
            ));
        }

        let algorithm_name = optional("JWT_ALGORITHM").unwrap_or_else(|| "HS256".into());
        let algorithm = Algorithm::from_str(&algorithm_name)
            .map_err(|_| VigilError::Config(format!("unknown JWT_ALGORITHM {algorithm_name}")))?;
        let is_hmac = matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512);

        let secret = optional("JWT_SECRET_KEY");
        let private_key_pem = optional("JWT_PRIVATE_KEY_PEM");
        if private_key_pem.is_none() && !(is_hmac && secret.is_some()) {
            return Err(VigilError::Config(
                "no signing key configured: set JWT_PRIVATE_KEY_PEM, or JWT_SECRET_KEY with an HMAC algorithm".into(),
            ));
        }

        let tokens = TokenConfig {
            algorithm,
            secret,
            private_key_pem,
            public_key_pem: optional("JWT_PUBLIC_KEY_PEM"),
            active_kid: optional("JWT_ACTIVE_KID"),
            audience: optional("JWT_AUDIENCE"),
            issuer: optional("JWT_ISSUER"),
            clock_skew_secs: optional_parsed("JWT_CLOCK_SKEW_SECONDS", 30)?,
            jwks_url: optional("JWKS_URL"),
            jwks_cache_ttl_secs: optional_parsed("JWKS_CACHE_TTL_SECONDS", 300)?,
            access_ttl_mins: optional_parsed("JWT_EXPIRE_MINUTES", 15)?,
            refresh_base_ttl_mins: optional_parsed("REFRESH_BASE_TTL_MINUTES", 7 * 24 * 60)?,
            refresh_extend_mins: optional_parsed("REFRESH_EXTEND_MINUTES", 24 * 60)?,
            refresh_max_ttl_mins: optional_parsed("REFRESH_MAX_TTL_MINUTES", 30 * 24 * 60)?,
            fp_secret: required("REFRESH_FP_SECRET")?,
        };

        Ok(Self {
            environment,
            database_url: required("DATABASE_URL")?,
            redis_url,
            billing_webhook_secret: required("BILLING_WEBHOOK_SECRET")?,
            cors_origins: csv("CORS_ORIGINS"),
            ws_allowed_origins: csv("WS_ALLOWED_ORIGINS"),
            ws_rate_limit_window_secs: optional_parsed("WS_RATE_LIMIT_WINDOW_SECS", 60)?,
            ws_rate_limit_max: optional_parsed("WS_RATE_LIMIT_MAX", 10)?,
            analyzer_queue_depth_limit: optional_parsed("ANALYZER_QUEUE_DEPTH_LIMIT", 1000)?,
            analyzer_p95_limit_ms: optional_parsed("ANALYZER_P95_LIMIT_MS", 500)?,
            analyzer_workers: optional("ANALYZER_WORKERS")
                .map(|raw| {
                    raw.parse()
                        .map_err(|_| VigilError::Config("ANALYZER_WORKERS is not a valid number".into()))
                })
                .transpose()?,
            play_integrity_api_key: optional("PLAY_INTEGRITY_API_KEY"),
            app_attest_validator_url: optional("APP_ATTEST_VALIDATOR_URL"),
            jwks_document: load_jwks_document()?,
            tokens,
        })
    }
}

/// The JWKS served at /internal/jwks: inline JSON wins over a file path.
fn load_jwks_document() -> Result<Option<serde_json::Value>, VigilError> {
    if let Some(raw) = optional("JWKS_STATIC_JSON") {
        let doc = serde_json::from_str(&raw)
            .map_err(|e| VigilError::Config(format!("JWKS_STATIC_JSON is not valid JSON: {e}")))?;
        return Ok(Some(doc));
    }
    if let Some(path) = optional("JWKS_STATIC_PATH") {
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| VigilError::Config(format!("cannot read JWKS from {path}: {e}")))?;
        let doc = serde_json::from_str(&raw)
            .map_err(|e| VigilError::Config(format!("JWKS at {path} is not valid JSON: {e}")))?;
        return Ok(Some(doc));
    }
    Ok(None)
}
