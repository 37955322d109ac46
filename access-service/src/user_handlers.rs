use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use common_auth::Authenticated;
use common_http_errors::{ApiError, ApiResult};
use common_security::{authorize, Membership, Principal, Role, SecurityContext, Tier};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::gate::{reject, trace_id_from, Caller};
use crate::promotion::Transition;

#[derive(Debug, Default, Deserialize)]
pub struct VendorQuery {
    pub vendor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MembershipView {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub tenant_slug: Option<String>,
    pub role: Role,
    pub effective_role: Role,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub principal: Principal,
    pub memberships: Vec<MembershipView>,
}

/// Self-registration only needs a verified token and an active principal; the
/// caller has no memberships yet.
pub async fn register(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    auth: Result<Authenticated, common_auth::AuthError>,
) -> ApiResult<(StatusCode, Json<Membership>)> {
    let trace_id = trace_id_from(&headers);
    let auth = auth.map_err(|_| ApiError::Unauthenticated { trace_id })?;
    let active = state
        .identities
        .principal(auth.principal_id)
        .await
        .map_err(|err| reject(err, trace_id))?
        .map(|principal| principal.active)
        .unwrap_or(false);
    if !active {
        return Err(ApiError::Unauthenticated { trace_id });
    }
    let membership = state
        .memberships
        .register(auth.principal_id)
        .await
        .map_err(|err| reject(err, trace_id))?;
    info!(principal_id = %auth.principal_id, "principal_registered");
    Ok((StatusCode::CREATED, Json(membership)))
}

pub async fn me(Caller(ctx): Caller) -> Json<MeResponse> {
    let memberships = ctx
        .grants()
        .iter()
        .map(|grant| MembershipView {
            id: grant.membership.id,
            tenant_id: grant.membership.tenant_id,
            tenant_slug: grant.tenant_slug().map(str::to_string),
            role: grant.membership.role,
            effective_role: grant.effective_role(),
        })
        .collect();
    Json(MeResponse { principal: ctx.principal.clone(), memberships })
}

/// Gate in front of the state machine: the tier's admin role, scoped to the
/// named vendor when one is given.
fn gate_transition(ctx: &SecurityContext, tier: Tier, vendor: Option<&str>) -> ApiResult<()> {
    let admin = [tier.admin_role()];
    let slug = match tier {
        Tier::Platform => None,
        Tier::Vendor => vendor,
    };
    authorize(Some(ctx), slug, &admin, false).map_err(|err| reject(err, ctx.trace_id))
}

async fn transition(
    state: AppState,
    ctx: SecurityContext,
    target_id: Uuid,
    operation: Transition,
    tier: Tier,
    vendor: Option<String>,
) -> ApiResult<Json<Membership>> {
    gate_transition(&ctx, tier, vendor.as_deref())?;
    let actor_id = ctx.principal_id();
    let result = match operation {
        Transition::Promote => state.promotions.promote(actor_id, target_id, tier, vendor).await,
        Transition::Demote => state.promotions.demote(actor_id, target_id, tier, vendor).await,
    };
    result.map(Json).map_err(|err| reject(err, ctx.trace_id))
}

pub async fn make_platform_agent(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Membership>> {
    transition(state, ctx, id, Transition::Promote, Tier::Platform, None).await
}

pub async fn remove_platform_agent(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Membership>> {
    transition(state, ctx, id, Transition::Demote, Tier::Platform, None).await
}

pub async fn make_vendor_agent(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<VendorQuery>,
) -> ApiResult<Json<Membership>> {
    transition(state, ctx, id, Transition::Promote, Tier::Vendor, query.vendor).await
}

pub async fn remove_vendor_agent(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<VendorQuery>,
) -> ApiResult<Json<Membership>> {
    transition(state, ctx, id, Transition::Demote, Tier::Vendor, query.vendor).await
}
