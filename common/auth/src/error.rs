use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token missing kid header")]
    MissingKeyId,
    #[error("no decoding key registered for kid '{0}'")]
    UnknownKeyId(String),
    #[error("failed to decode token header: {0}")]
    InvalidHeader(String),
    #[error("token verification failed: {0}")]
    Verification(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
    #[error("failed to parse decoding key for kid '{0}': {1}")]
    KeyParse(String, String),
    #[error("authorization header missing")]
    MissingAuthorization,
    #[error("authorization header malformed")]
    InvalidAuthorization,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidClaim(_, _) | AuthError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            AuthError::KeyParse(_, _) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorization | AuthError::InvalidAuthorization => "auth_header",
            AuthError::MissingKeyId | AuthError::UnknownKeyId(_) => "auth_key",
            AuthError::InvalidHeader(_) | AuthError::Verification(_) => "auth_token",
            AuthError::InvalidClaim(_, _) | AuthError::InvalidJson(_) => "auth_claims",
            AuthError::KeyParse(_, _) => "auth_config",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        Self::Verification(value.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let body = ErrorBody { code, message: self.to_string() };
        let mut response = (status, Json(body)).into_response();
        response.headers_mut().insert("X-Error-Code", HeaderValue::from_static(code));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_problems_are_unauthorized() {
        let response = AuthError::MissingAuthorization.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get("X-Error-Code").unwrap(), "auth_header");
    }

    #[test]
    fn malformed_claims_are_bad_requests() {
        assert_eq!(AuthError::InvalidClaim("sub", "x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::Verification("expired".into()).status(), StatusCode::UNAUTHORIZED);
    }
}
