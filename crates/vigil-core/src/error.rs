use thiserror::Error;

/// Error taxonomy for the whole control plane.
///
/// Policy errors (the first block) surface at the admission boundary with a
/// short `detail` string; infrastructure errors (the second block) are logged
/// and mapped to 500 without echoing internals.
#[derive(Debug, Error)]
pub enum VigilError {
    // ── Policy / boundary errors ─────────────────────────────────────────────
    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Access(String),

    #[error("{0}")]
    PaymentRequired(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Blocked(String),

    #[error("{0}")]
    RateLimited(String),

    /// Webhook signature mismatch.
    #[error("{0}")]
    Integrity(String),

    /// Signing/verification key cannot be resolved right now.
    #[error("{0}")]
    Unavailable(String),

    /// Configuration missing at request time.
    #[error("configuration error: {0}")]
    Config(String),

    // ── Infrastructure errors ────────────────────────────────────────────────
    #[error("coordination error: {0}")]
    Coord(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Internal(String),
}
