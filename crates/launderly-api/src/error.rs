use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use launderly_lifecycle::LifecycleError;

/// Error returned by every handler. Rendered as `{ "error", "code" }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error("invalid email or password")]
    BadCredentials,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::BadCredentials => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Lifecycle(e) => match e {
                LifecycleError::NotFound { .. } => StatusCode::NOT_FOUND,
                LifecycleError::Forbidden(_) => StatusCode::FORBIDDEN,
                LifecycleError::InvalidTransition { .. }
                | LifecycleError::InvalidState(_)
                | LifecycleError::Conflict { .. } => StatusCode::CONFLICT,
                LifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
                LifecycleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized | Self::BadCredentials => "UNAUTHORIZED",
            Self::BadRequest(_) => "VALIDATION_ERROR",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Lifecycle(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("Internal error: {:#}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            error: message,
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_errors_map_to_http() {
        let cases = [
            (LifecycleError::not_found("order", "x"), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (LifecycleError::Forbidden("no".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (
                LifecycleError::InvalidTransition {
                    entity: "order",
                    event: "complete",
                    from: "IN_PROGRESS".into(),
                },
                StatusCode::CONFLICT,
                "INVALID_TRANSITION",
            ),
            (LifecycleError::InvalidState("scanned".into()), StatusCode::CONFLICT, "INVALID_STATE"),
            (LifecycleError::conflict("order", "x"), StatusCode::CONFLICT, "CONFLICT"),
            (LifecycleError::Validation("empty".into()), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        ];
        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status(), status);
            assert_eq!(api.code(), code);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::from(anyhow::anyhow!("disk on fire"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "INTERNAL_ERROR");
    }
}
