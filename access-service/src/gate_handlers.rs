use axum::extract::State;
use axum::http::{HeaderMap, Method};
use axum::Json;
use common_auth::Authenticated;
use common_cache::{EntityWrite, HookError, HookReport};
use common_http_errors::{ApiError, ApiResult};
use common_security::{authorize, is_safe_method, Role, SecurityError, PLATFORM_STAFF_ROLES, VENDOR_STAFF_ROLES};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::gate::{load_context, reject, trace_id_from, Caller};

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub tenant_slug: Option<String>,
    #[serde(default)]
    pub required_roles: Vec<Role>,
    pub method: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AuthorizeDecision {
    pub allow: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Permission gate for sibling services. A denied decision is a 200 with
/// `allow: false`; only an unusable token or request is an error.
pub async fn authorize_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    auth: Result<Authenticated, common_auth::AuthError>,
    Json(body): Json<AuthorizeRequest>,
) -> ApiResult<Json<AuthorizeDecision>> {
    let trace_id = trace_id_from(&headers);
    let auth = auth.map_err(|_| ApiError::Unauthenticated { trace_id })?;
    let method = Method::from_bytes(body.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ApiError::bad_request("invalid_method", trace_id))?;

    let ctx = match load_context(&state, auth.principal_id).await {
        Ok(ctx) => Some(ctx.with_trace_id(trace_id)),
        Err(SecurityError::Unauthenticated) => None,
        Err(err) => return Err(reject(err, trace_id)),
    };
    let decision = authorize(
        ctx.as_ref(),
        body.tenant_slug.as_deref(),
        &body.required_roles,
        is_safe_method(&method),
    );
    state.metrics.authorization(decision.is_ok());
    Ok(Json(match decision {
        Ok(()) => AuthorizeDecision { allow: true, reason: None },
        Err(err) => AuthorizeDecision { allow: false, reason: Some(err.to_string()) },
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteEntity {
    Tenant,
    Category,
    Product,
    CartItem,
    Order,
}

#[derive(Debug, Deserialize)]
pub struct WriteEventRequest {
    pub entity: WriteEntity,
    pub tenant_slug: Option<String>,
    pub cart_id: Option<Uuid>,
}

fn entity_write(body: WriteEventRequest, trace_id: Option<Uuid>) -> ApiResult<EntityWrite> {
    let tenant_slug = body
        .tenant_slug
        .map(|slug| slug.trim().to_string())
        .filter(|slug| !slug.is_empty())
        .ok_or_else(|| ApiError::bad_request("missing_tenant_slug", trace_id))?;
    Ok(match body.entity {
        WriteEntity::Tenant => EntityWrite::Tenant { slug: tenant_slug },
        WriteEntity::Category => EntityWrite::Category { tenant_slug },
        WriteEntity::Product => EntityWrite::Product { tenant_slug },
        WriteEntity::Order => EntityWrite::Order { tenant_slug },
        WriteEntity::CartItem => {
            let cart_id = body.cart_id.ok_or_else(|| ApiError::bad_request("missing_cart_id", trace_id))?;
            EntityWrite::CartItem { tenant_slug, cart_id }
        }
    })
}

fn tenant_of(write: &EntityWrite) -> &str {
    match write {
        EntityWrite::Tenant { slug } | EntityWrite::TenantDeleted { slug } => slug,
        EntityWrite::Category { tenant_slug }
        | EntityWrite::Product { tenant_slug }
        | EntityWrite::CartItem { tenant_slug, .. }
        | EntityWrite::Order { tenant_slug } => tenant_slug,
    }
}

/// Post-write hook for writes committed by sibling services.
pub async fn record_write_event(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Json(body): Json<WriteEventRequest>,
) -> ApiResult<Json<HookReport>> {
    let write = entity_write(body, ctx.trace_id)?;
    let staff: Vec<Role> = VENDOR_STAFF_ROLES.iter().chain(PLATFORM_STAFF_ROLES).copied().collect();
    if let Err(err) = authorize(Some(&ctx), Some(tenant_of(&write)), &staff, false) {
        warn!(principal_id = %ctx.principal_id(), tenant_slug = tenant_of(&write), "write_event_rejected");
        return Err(reject(err, ctx.trace_id));
    }

    let report = state.hooks.after_write(&write).await.map_err(|err| match err {
        HookError::CartNotFound { .. } => {
            warn!(principal_id = %ctx.principal_id(), error = %err, "write_event_cart_not_found");
            ApiError::not_found("cart_not_found", err.to_string(), ctx.trace_id)
        }
        HookError::CartTotal { .. } => {
            error!(principal_id = %ctx.principal_id(), error = %err, "write_hook_failed");
            ApiError::internal(err, ctx.trace_id)
        }
    })?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cart_item_events_need_a_cart() {
        let body = WriteEventRequest { entity: WriteEntity::CartItem, tenant_slug: Some("acme".into()), cart_id: None };
        let err = entity_write(body, None).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { code: "missing_cart_id", .. }));
    }

    #[test]
    fn blank_slug_is_rejected() {
        let body = WriteEventRequest { entity: WriteEntity::Product, tenant_slug: Some("  ".into()), cart_id: None };
        let err = entity_write(body, None).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { code: "missing_tenant_slug", .. }));
    }

    #[test]
    fn events_map_onto_writes() {
        let cart_id = Uuid::new_v4();
        let body = WriteEventRequest { entity: WriteEntity::CartItem, tenant_slug: Some("acme".into()), cart_id: Some(cart_id) };
        assert_eq!(
            entity_write(body, None).unwrap(),
            EntityWrite::CartItem { tenant_slug: "acme".into(), cart_id }
        );
    }
}
