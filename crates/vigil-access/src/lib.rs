//! vigil-access
//!
//! Paywall and device-registration service.
//!
//! A device's paywall state is the pair `(is_premium, trial_expired)`:
//! premium comes from the subscription row, the trial clock starts at first
//! registration. New devices must present platform attestation before a
//! registration is created; validation itself is delegated to the platform
//! verifier endpoints.

pub mod attestation;
pub mod cache;
pub mod paywall;

pub use attestation::{AttestationPayload, AttestationVerifier};
pub use cache::CachedSubscription;
pub use paywall::{is_premium, AccessService, PaywallState};
