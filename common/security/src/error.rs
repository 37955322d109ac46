use axum::http::StatusCode;
use common_http_errors::ApiError;
use thiserror::Error;

/// Outcome kinds of authorization and membership operations. The HTTP layer
/// translates them to status codes; nothing below the boundary speaks HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidOperation(String),
    #[error("internal security error: {0}")]
    Internal(String),
}

impl SecurityError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound(reason.into())
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOperation(reason.into())
    }

    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        Self::Internal(err.to_string())
    }

    /// Stable label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SecurityError::Unauthenticated => "unauthenticated",
            SecurityError::Forbidden(_) => "forbidden",
            SecurityError::NotFound(_) => "not_found",
            SecurityError::InvalidOperation(_) => "invalid_operation",
            SecurityError::Internal(_) => "internal",
        }
    }
}

impl From<SecurityError> for (StatusCode, String) {
    fn from(e: SecurityError) -> Self {
        let status = match e {
            SecurityError::Unauthenticated => StatusCode::UNAUTHORIZED,
            SecurityError::Forbidden(_) => StatusCode::FORBIDDEN,
            SecurityError::NotFound(_) => StatusCode::NOT_FOUND,
            SecurityError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            SecurityError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, e.to_string())
    }
}

impl From<SecurityError> for ApiError {
    fn from(e: SecurityError) -> Self {
        match e {
            SecurityError::Unauthenticated => ApiError::Unauthenticated { trace_id: None },
            SecurityError::Forbidden(reason) => ApiError::Forbidden { trace_id: None, message: Some(reason) },
            SecurityError::NotFound(reason) => ApiError::NotFound { code: "not_found", trace_id: None, message: Some(reason) },
            SecurityError::InvalidOperation(reason) => ApiError::invalid_operation(reason, None),
            SecurityError::Internal(reason) => ApiError::Internal { trace_id: None, message: Some(reason) },
        }
    }
}
