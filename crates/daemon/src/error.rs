use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use collab_core::api::ErrorBody;
use collab_core::BridgeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request<E: std::fmt::Display>(e: E) -> Self {
        Self::BadRequest(e.to_string())
    }
    pub fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::BadRequest(m) => ApiError::BadRequest(m),
            // Session failures arrive as `Unauthorized`. `Auth` here is the
            // server's own credential failing.
            BridgeError::Unauthorized => ApiError::Unauthorized,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorBody { message })).into_response()
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody { message })).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_session_failures_are_unauthorized() {
        assert!(matches!(ApiError::from(BridgeError::Unauthorized), ApiError::Unauthorized));
        assert!(matches!(
            ApiError::from(BridgeError::Auth("token endpoint down".into())),
            ApiError::Internal(_)
        ));
        assert!(matches!(
            ApiError::from(BridgeError::BadRequest("Missing Data".into())),
            ApiError::BadRequest(_)
        ));
    }

    #[test]
    fn server_credential_failure_is_a_500() {
        let resp = ApiError::from(BridgeError::Auth("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let resp = ApiError::from(BridgeError::Unauthorized).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
