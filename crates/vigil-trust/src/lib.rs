//! vigil-trust
//!
//! Pure scoring logic: no I/O, no clocks, deterministic for a given input.
//!
//! `engine` turns a sensor payload plus its recent history into a composite
//! trust score with diagnostics. `baseline` maintains the per-device Welford
//! running variance the analyzer uses for adaptive thresholds. `edr` maps an
//! endpoint-detection report to a risk score, level, and action list.

pub mod baseline;
pub mod edr;
pub mod engine;

pub use baseline::WelfordBaseline;
pub use edr::{compute_risk, EdrRisk};
pub use engine::{compute_trust_score, TrustDiagnostics};
