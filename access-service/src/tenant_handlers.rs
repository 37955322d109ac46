use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use common_cache::{CacheKey, EntityWrite};
use common_http_errors::{ApiError, ApiResult};
use common_security::{ensure_role, Membership, Role, SecurityContext, Tenant};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app::AppState;
use crate::gate::{reject, Caller};
use crate::store::{NewTenant, TenantFilter};
use crate::tenants::{own_tenants, sees_all_tenants, slugify};

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub company_name: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedTenant {
    pub tenant: Tenant,
    pub membership: Membership,
}

fn require_platform_admin(ctx: &SecurityContext) -> ApiResult<()> {
    if ctx.is_elevated() {
        return Ok(());
    }
    ensure_role(ctx, Role::PlatformAdmin, None)
        .map_err(|_| ApiError::ForbiddenMissingRole { role: Role::PlatformAdmin.as_str(), trace_id: ctx.trace_id })
}

async fn run_hook(state: &AppState, ctx: &SecurityContext, write: EntityWrite) -> ApiResult<()> {
    state
        .hooks
        .after_write(&write)
        .await
        .map(|_| ())
        .map_err(|err| ApiError::internal(err, ctx.trace_id))
}

pub async fn create_tenant(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Json(body): Json<CreateTenantRequest>,
) -> ApiResult<(StatusCode, Json<CreatedTenant>)> {
    let company_name = body.company_name.trim().to_string();
    let slug = slugify(&company_name);
    if slug.is_empty() {
        return Err(ApiError::BadRequest {
            code: "invalid_company_name",
            trace_id: ctx.trace_id,
            message: Some("company_name must contain at least one letter or digit".into()),
        });
    }

    let (tenant, membership) = state
        .tenants
        .create_tenant(ctx.principal_id(), NewTenant { slug, company_name })
        .await
        .map_err(|err| reject(err, ctx.trace_id))?;
    info!(principal_id = %ctx.principal_id(), tenant_slug = %tenant.slug, "tenant_created");
    run_hook(&state, &ctx, EntityWrite::Tenant { slug: tenant.slug.clone() }).await?;
    Ok((StatusCode::CREATED, Json(CreatedTenant { tenant, membership })))
}

pub async fn list_tenants(State(state): State<AppState>, Caller(ctx): Caller) -> ApiResult<Json<Vec<Tenant>>> {
    if sees_all_tenants(&ctx) {
        let tenants = state
            .tenants
            .list_tenants(TenantFilter::All)
            .await
            .map_err(|err| reject(err, ctx.trace_id))?;
        return Ok(Json(tenants));
    }
    Ok(Json(own_tenants(&ctx)))
}

async fn cached_listing(state: &AppState, ctx: &SecurityContext, key: CacheKey, filter: TenantFilter) -> ApiResult<Vec<Tenant>> {
    let tenants = state.tenants.clone();
    state
        .cache()
        .read_through(&key, || async move { tenants.list_tenants(filter).await })
        .await
        .map_err(|err| reject(err, ctx.trace_id))
}

pub async fn list_approved_tenants(State(state): State<AppState>, Caller(ctx): Caller) -> ApiResult<Json<Vec<Tenant>>> {
    require_platform_admin(&ctx)?;
    cached_listing(&state, &ctx, CacheKey::ApprovedTenants, TenantFilter::Approved).await.map(Json)
}

pub async fn list_pending_tenants(State(state): State<AppState>, Caller(ctx): Caller) -> ApiResult<Json<Vec<Tenant>>> {
    require_platform_admin(&ctx)?;
    cached_listing(&state, &ctx, CacheKey::PendingTenants, TenantFilter::Pending).await.map(Json)
}

async fn set_approval(state: AppState, ctx: SecurityContext, slug: String, approved: bool) -> ApiResult<Json<Tenant>> {
    require_platform_admin(&ctx)?;
    let tenant = state
        .tenants
        .set_approved(&slug, approved)
        .await
        .map_err(|err| reject(err, ctx.trace_id))?
        .ok_or_else(|| ApiError::not_found("vendor_not_found", format!("Vendor '{slug}' not found."), ctx.trace_id))?;
    info!(principal_id = %ctx.principal_id(), tenant_slug = %slug, approved, "tenant_approval_changed");
    run_hook(&state, &ctx, EntityWrite::Tenant { slug }).await?;
    Ok(Json(tenant))
}

pub async fn approve_tenant(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(slug): Path<String>,
) -> ApiResult<Json<Tenant>> {
    set_approval(state, ctx, slug, true).await
}

pub async fn reject_tenant(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(slug): Path<String>,
) -> ApiResult<Json<Tenant>> {
    set_approval(state, ctx, slug, false).await
}

pub async fn delete_tenant(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(slug): Path<String>,
) -> ApiResult<StatusCode> {
    require_platform_admin(&ctx)?;
    let deleted = state
        .tenants
        .delete_tenant(&slug)
        .await
        .map_err(|err| reject(err, ctx.trace_id))?;
    if !deleted {
        return Err(ApiError::not_found("vendor_not_found", format!("Vendor '{slug}' not found."), ctx.trace_id));
    }
    info!(principal_id = %ctx.principal_id(), tenant_slug = %slug, "tenant_deleted");
    run_hook(&state, &ctx, EntityWrite::TenantDeleted { slug }).await?;
    Ok(StatusCode::NO_CONTENT)
}
