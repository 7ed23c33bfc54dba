//! ─── Vigil Protocol Constants ───────────────────────────────────────────────
//!
//! Trust scoring windows, coordination-store TTLs, and rate-limit ceilings
//! shared by every subsystem. Anything operators are expected to tune lives
//! in the server configuration instead; these are the protocol's fixed points.

// ── Trust scoring ─────────────────────────────────────────────────────────────

/// Maximum number of recent payloads retained per device and consumed by the
/// trust engine. Older entries are trimmed on every push.
pub const RECENT_PAYLOAD_CAP: usize = 100;

/// Smoothing factor for the exponential moving averages over sensor series.
pub const EMA_ALPHA: f64 = 0.2;

/// Fixed verdict threshold for the read path: scores at or above this are
/// "safe", below it "block". The analyzer applies a per-device adaptive
/// threshold on top of this.
pub const TRUST_VERDICT_THRESHOLD: i64 = 50;

/// Score presumed for a device that has no published decision yet.
pub const DEFAULT_TRUST_SCORE: i64 = 80;

/// Baseline sample count required before the adaptive threshold replaces the
/// fixed default.
pub const BASELINE_MIN_SAMPLES: u64 = 10;

/// Floor for the adaptive threshold once enough baseline samples exist.
pub const ADAPTIVE_THRESHOLD_FLOOR: f64 = 30.0;

// ── Coordination-store TTLs (seconds) ─────────────────────────────────────────

/// How long a revoked/blocked device stays blocked.
pub const BLOCK_TTL_SECS: u64 = 3600;

/// Idle expiry for per-device Welford baselines.
pub const BASELINE_TTL_SECS: i64 = 7 * 24 * 3600;

/// Lifetime of a published trust decision.
pub const DECISION_TTL_SECS: u64 = 300;

/// Lifetime of the cached subscription hash.
pub const SUB_CACHE_TTL_SECS: i64 = 900;

// ── Paywall ───────────────────────────────────────────────────────────────────

/// Trial window measured from device registration.
pub const TRIAL_PERIOD_DAYS: i64 = 7;

// ── Refresh tokens ────────────────────────────────────────────────────────────

/// Per-device refresh attempts allowed inside one window.
pub const REFRESH_RATE_LIMIT_MAX: i64 = 10;
pub const REFRESH_RATE_LIMIT_WINDOW_SECS: i64 = 60;

// ── Kill-switch channel ───────────────────────────────────────────────────────

/// Pub/sub channel carrying kill-switch messages verbatim.
pub const KILL_SWITCH_CHANNEL: &str = "kill-switch";

// ── Analyzer ──────────────────────────────────────────────────────────────────

/// Latency histogram bucket upper bounds, in milliseconds.
pub const LATENCY_BUCKETS_MS: &[f64] = &[50.0, 100.0, 200.0, 300.0, 500.0, 800.0, 1200.0];

/// Newest runtime samples considered by the latency circuit breaker.
pub const RUNTIME_SAMPLE_WINDOW: usize = 200;

/// Retained runtime samples (trimmed after each push).
pub const RUNTIME_SAMPLE_CAP: usize = 300;
