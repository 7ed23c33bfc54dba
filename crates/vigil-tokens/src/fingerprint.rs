use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Bind a client-supplied fingerprint into refresh-token storage.
///
/// The raw fingerprint never reaches the coordination store; only this keyed
/// digest does, as the last segment of the refresh key. A refresh attempt
/// with a different fingerprint therefore looks up a key that does not
/// exist, which the service treats the same as replay.
pub fn fingerprint_hash(secret: &str, fingerprint: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(fingerprint.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_per_secret() {
        let a = fingerprint_hash("s3cret", "fp-123");
        let b = fingerprint_hash("s3cret", "fp-123");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_diverges_on_fingerprint_or_secret() {
        let base = fingerprint_hash("s3cret", "fp-123");
        assert_ne!(base, fingerprint_hash("s3cret", "fp-124"));
        assert_ne!(base, fingerprint_hash("other", "fp-123"));
    }
}
