use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub missing_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")] pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
}

/// Boundary error: every failure a handler returns is translated here into a status code,
/// a JSON body and an `X-Error-Code` header.
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated { trace_id: Option<Uuid> },
    ForbiddenMissingRole { role: &'static str, trace_id: Option<Uuid> },
    Forbidden { trace_id: Option<Uuid>, message: Option<String> },
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    NotFound { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E, trace_id: Option<Uuid>) -> Self { Self::Internal { trace_id, message: Some(e.to_string()) } }
    pub fn bad_request(code: &'static str, trace_id: Option<Uuid>) -> Self { Self::BadRequest { code, trace_id, message: None } }
    pub fn invalid_operation(message: impl Into<String>, trace_id: Option<Uuid>) -> Self {
        Self::BadRequest { code: "invalid_operation", trace_id, message: Some(message.into()) }
    }
    pub fn not_found(code: &'static str, message: impl Into<String>, trace_id: Option<Uuid>) -> Self {
        Self::NotFound { code, trace_id, message: Some(message.into()) }
    }

    /// Attach a trace id when the variant does not carry one yet.
    pub fn with_trace_id(mut self, id: Option<Uuid>) -> Self {
        let slot = match &mut self {
            ApiError::Unauthenticated { trace_id }
            | ApiError::ForbiddenMissingRole { trace_id, .. }
            | ApiError::Forbidden { trace_id, .. }
            | ApiError::BadRequest { trace_id, .. }
            | ApiError::NotFound { trace_id, .. }
            | ApiError::Internal { trace_id, .. } => trace_id,
        };
        if slot.is_none() {
            *slot = id;
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            ApiError::ForbiddenMissingRole { .. } | ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (body, error_code) = match self {
            ApiError::Unauthenticated { trace_id } => (
                ErrorBody { code: "unauthenticated".into(), missing_role: None, trace_id, message: None },
                "unauthenticated"
            ),
            ApiError::ForbiddenMissingRole { role, trace_id } => (
                ErrorBody { code: "missing_role".into(), missing_role: Some(role.into()), trace_id, message: None },
                "missing_role"
            ),
            ApiError::Forbidden { trace_id, message } => (
                ErrorBody { code: "forbidden".into(), missing_role: None, trace_id, message },
                "forbidden"
            ),
            ApiError::BadRequest { code, trace_id, message } => (
                ErrorBody { code: code.into(), missing_role: None, trace_id, message },
                code
            ),
            ApiError::NotFound { code, trace_id, message } => (
                ErrorBody { code: code.into(), missing_role: None, trace_id, message },
                code
            ),
            ApiError::Internal { trace_id, message } => (
                ErrorBody { code: "internal_error".into(), missing_role: None, trace_id, message },
                "internal_error"
            ),
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
