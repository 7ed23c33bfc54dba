//! vigil-tokens
//!
//! Token lifecycle: short-lived access tokens and rotating refresh tokens
//! bound to a `(user, device)` pair and a client fingerprint.
//!
//! `codec` signs and verifies the JWS itself (JWKS endpoint, public PEM, or
//! HMAC secret). `service` layers the stateful parts on top: refresh
//! rotation with replay detection, sliding TTLs, and the device-wide
//! revoke-and-block primitive that feeds the kill-switch channel.

pub mod claims;
pub mod codec;
pub mod fingerprint;
pub mod keyset;
pub mod service;

pub use claims::{TokenClaims, TokenType};
pub use codec::TokenCodec;
pub use fingerprint::fingerprint_hash;
pub use keyset::KeyResolver;
pub use service::{TokenConfig, TokenPair, TokenService};
