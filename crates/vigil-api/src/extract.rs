use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use vigil_core::error::VigilError;
use vigil_tokens::{TokenClaims, TokenType};

use crate::error::ApiError;
use crate::state::AppState;

// ── Token extraction ─────────────────────────────────────────────────────────

/// Pull the bearer token out of an `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Pull the bearer token a push socket offers: either the
/// `Sec-WebSocket-Protocol: bearer,<jwt>` subprotocol entries or a plain
/// `Authorization` header.
pub fn ws_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("sec-websocket-protocol").and_then(|v| v.to_str().ok()) {
        let entries: Vec<&str> = value.split(',').map(str::trim).filter(|e| !e.is_empty()).collect();
        if let Some(pos) = entries.iter().position(|e| e.eq_ignore_ascii_case("bearer")) {
            if let Some(token) = entries.get(pos + 1) {
                return Some((*token).to_string());
            }
        }
        // Tolerate a single "bearer <jwt>" entry.
        if let Some(entry) = entries.iter().find(|e| e.len() > 6 && e[..6].eq_ignore_ascii_case("bearer")) {
            let token = entry[6..].trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    bearer_token(headers)
}

/// Fail unless the token was minted for exactly this device.
pub fn assert_device_access(device_id: &str, claims: &TokenClaims) -> Result<(), VigilError> {
    if claims.device_id != device_id {
        return Err(VigilError::Access("Token not authorized for this device".into()));
    }
    Ok(())
}

// ── Claims extractor ─────────────────────────────────────────────────────────

/// Verified claims for routes outside the admission filter (billing, auth).
/// Runs the full verification including revocation markers.
pub struct CurrentClaims(pub TokenClaims);

impl FromRequestParts<AppState> for CurrentClaims {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| VigilError::Auth("Missing bearer token".into()))?;
        let claims = state
            .tokens
            .verify_with_revocation(&token, TokenType::Access)
            .await?;
        Ok(Self(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                axum::http::HeaderName::try_from(*k).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn bearer_header_parsing() {
        let map = headers(&[("authorization", "Bearer abc.def.ghi")]);
        assert_eq!(bearer_token(&map).as_deref(), Some("abc.def.ghi"));

        let map = headers(&[("authorization", "bearer xyz")]);
        assert_eq!(bearer_token(&map).as_deref(), Some("xyz"));

        let map = headers(&[("authorization", "Basic xyz")]);
        assert_eq!(bearer_token(&map), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn ws_token_from_subprotocol_entries() {
        let map = headers(&[("sec-websocket-protocol", "bearer, abc.def.ghi")]);
        assert_eq!(ws_token(&map).as_deref(), Some("abc.def.ghi"));

        let map = headers(&[("sec-websocket-protocol", "bearer abc.def.ghi")]);
        assert_eq!(ws_token(&map).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn ws_token_falls_back_to_authorization() {
        let map = headers(&[("authorization", "Bearer tok")]);
        assert_eq!(ws_token(&map).as_deref(), Some("tok"));
        assert_eq!(ws_token(&HeaderMap::new()), None);
    }
}
