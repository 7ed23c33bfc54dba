use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use vigil_core::error::VigilError;

/// Boundary adapter: maps the error taxonomy onto HTTP statuses with a
/// short `detail` body. Infrastructure errors are logged and collapsed to a
/// generic 500 so internals never leak.
pub struct ApiError(pub VigilError);

impl From<VigilError> for ApiError {
    fn from(e: VigilError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            VigilError::Auth(msg) | VigilError::Integrity(msg) => {
                (StatusCode::UNAUTHORIZED, msg.clone())
            }
            VigilError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg.clone()),
            VigilError::Access(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            VigilError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            VigilError::Blocked(msg) => (StatusCode::LOCKED, msg.clone()),
            VigilError::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            VigilError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            VigilError::Serialization(_) => {
                (StatusCode::BAD_REQUEST, "Malformed request body".to_string())
            }
            VigilError::Config(msg) => {
                error!(error = %self.0, "configuration error surfaced at request time");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            VigilError::Coord(_) | VigilError::Storage(_) | VigilError::Internal(_) => {
                error!(error = %self.0, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: VigilError) -> StatusCode {
        ApiError(e).into_response().status()
    }

    #[test]
    fn taxonomy_maps_to_expected_statuses() {
        assert_eq!(status_of(VigilError::Auth("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(VigilError::Integrity("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(VigilError::PaymentRequired("x".into())), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(status_of(VigilError::Access("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(VigilError::Blocked("x".into())), StatusCode::LOCKED);
        assert_eq!(status_of(VigilError::RateLimited("x".into())), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status_of(VigilError::Unavailable("x".into())), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_of(VigilError::Coord("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
