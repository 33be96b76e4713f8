use crate::error::AppError;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

/// Stable machine-readable error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
    pub code: &'static str,
}

/// Map domain errors to HTTP responses. Internal detail never leaks: 5xx
/// bodies carry a generic message.
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let code = match err {
        AppError::Validation(_) => "VALIDATION_ERROR",
        AppError::Unauthorized => "AUTHENTICATION_ERROR",
        AppError::Forbidden => "AUTHORIZATION_ERROR",
        AppError::NotFound => "NOT_FOUND",
        AppError::Conflict(_) => "CONFLICT",
        AppError::Upstream(_) => "UPSTREAM_UNAVAILABLE",
        AppError::Config(_)
        | AppError::StartServer(_)
        | AppError::Database(_)
        | AppError::Internal => "INTERNAL_SERVER_ERROR",
    };

    let message = if status.is_server_error() {
        "internal server error".to_string()
    } else {
        err.to_string()
    };

    let response = ErrorResponse {
        error: status
            .canonical_reason()
            .unwrap_or("Error")
            .to_string(),
        message,
        status: status.as_u16(),
        code,
    };

    (status, response)
}

pub fn into_response(err: AppError) -> impl IntoResponse {
    if err.status_code() >= 500 {
        tracing::error!(error = %err, "request failed");
    }
    let (status, response) = map_error(&err);
    (status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_validation_to_400() {
        let (status, body) = map_error(&AppError::Validation("bad input".into()));
        assert_eq!(status.as_u16(), 400);
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert!(body.message.contains("bad input"));
    }

    #[test]
    fn maps_auth_errors_to_401_and_403() {
        let (status, body) = map_error(&AppError::Unauthorized);
        assert_eq!(status.as_u16(), 401);
        assert_eq!(body.code, "AUTHENTICATION_ERROR");

        let (status, body) = map_error(&AppError::Forbidden);
        assert_eq!(status.as_u16(), 403);
        assert_eq!(body.code, "AUTHORIZATION_ERROR");
    }

    #[test]
    fn maps_conflict_to_409() {
        let (status, body) = map_error(&AppError::Conflict("deleted".into()));
        assert_eq!(status.as_u16(), 409);
        assert_eq!(body.code, "CONFLICT");
    }

    #[test]
    fn server_errors_do_not_leak_detail() {
        let (status, body) = map_error(&AppError::Config("secret path /etc/x".into()));
        assert_eq!(status.as_u16(), 500);
        assert_eq!(body.message, "internal server error");
    }
}
