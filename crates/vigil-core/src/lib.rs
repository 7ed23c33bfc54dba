pub mod constants;
pub mod error;
pub mod payload;
pub mod plan;
pub mod types;

pub use constants::*;
pub use error::VigilError;
pub use payload::{DnsLog, EdrReport, SensorPayload, SuspiciousApp};
pub use plan::{PlanTier, RateLimit, SubscriptionStatus};
pub use types::{AttestationRecord, ThreatLevel};
