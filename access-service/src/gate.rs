use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderMap, StatusCode};
use common_auth::Authenticated;
use common_http_errors::ApiError;
use common_security::{SecurityContext, SecurityError};
use tracing::warn;
use uuid::Uuid;

use crate::app::AppState;

pub fn trace_id_from(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get("X-Trace-ID")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
}

/// Loads the role engine's view of a principal. Unknown or inactive principals
/// are unauthenticated.
pub async fn load_context(state: &AppState, principal_id: Uuid) -> Result<SecurityContext, SecurityError> {
    let principal = state
        .identities
        .principal(principal_id)
        .await?
        .filter(|principal| principal.active)
        .ok_or(SecurityError::Unauthenticated)?;
    let grants = state.memberships.grants_for(principal_id).await?;
    SecurityContext::new(principal, grants)
}

/// An authenticated, active caller with memberships loaded.
pub struct Caller(pub SecurityContext);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let trace_id = trace_id_from(&parts.headers);
        let auth = Authenticated::from_request_parts(parts, state).await.map_err(|err| {
            warn!(error = %err, "bearer_token_rejected");
            if err.status() == StatusCode::BAD_REQUEST {
                ApiError::BadRequest { code: err.code(), trace_id, message: Some(err.to_string()) }
            } else {
                ApiError::Unauthenticated { trace_id }
            }
        })?;
        let ctx = load_context(state, auth.principal_id)
            .await
            .map_err(|err| ApiError::from(err).with_trace_id(trace_id))?;
        Ok(Caller(ctx.with_trace_id(trace_id)))
    }
}

pub fn reject(err: SecurityError, trace_id: Option<Uuid>) -> ApiError {
    ApiError::from(err).with_trace_id(trace_id)
}
