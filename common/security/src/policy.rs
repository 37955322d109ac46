//! Role engine: pure decisions over a loaded [`SecurityContext`].

use axum::http::Method;
use tracing::warn;

use crate::context::SecurityContext;
use crate::roles::{Role, Tier};
use crate::SecurityError;

/// Read-only methods are open to every authenticated, active principal.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Does the principal hold `role`?
///
/// With a tenant context the `(principal, tenant)` membership decides, except
/// for platform-tier roles, which only ever live on the `(principal, null)`
/// membership. Without one, platform-tier and `user` checks use that platform
/// membership; vendor-tier checks ask whether any tenant-scoped membership
/// holds the role.
pub fn has_role(ctx: &SecurityContext, role: Role, tenant_slug: Option<&str>) -> bool {
    if !ctx.is_active() {
        return false;
    }
    if ctx.is_elevated() {
        return true;
    }

    match tenant_slug {
        _ if role.tier() == Some(Tier::Platform) => ctx
            .platform_grant()
            .map(|grant| grant.effective_role() == role)
            .unwrap_or(false),
        Some(slug) => ctx
            .tenant_grant_by_slug(slug)
            .map(|grant| grant.effective_role() == role)
            .unwrap_or(false),
        None if role.tier() == Some(Tier::Vendor) => ctx
            .grants()
            .iter()
            .any(|grant| grant.tenant.is_some() && grant.effective_role() == role),
        None => ctx
            .platform_grant()
            .map(|grant| grant.effective_role() == role)
            .unwrap_or(false),
    }
}

/// May the principal mutate resources of the tenant identified by `tenant_slug`?
///
/// Platform-tier roles act across tenants; every other role must come from a
/// membership whose tenant slug equals the one in the request.
pub fn can_act_on_tenant(ctx: &SecurityContext, tenant_slug: &str, allowed: &[Role]) -> bool {
    if !ctx.is_active() {
        return false;
    }
    if ctx.is_elevated() {
        return true;
    }

    if let Some(grant) = ctx.tenant_grant_by_slug(tenant_slug) {
        if allowed.contains(&grant.effective_role()) {
            return true;
        }
    }

    ctx.platform_grant()
        .map(|grant| {
            let role = grant.effective_role();
            role.tier() == Some(Tier::Platform) && allowed.contains(&role)
        })
        .unwrap_or(false)
}

/// The permission gate every mutating or tenant-scoped route calls before dispatch.
pub fn authorize(
    ctx: Option<&SecurityContext>,
    tenant_slug: Option<&str>,
    required: &[Role],
    safe_method: bool,
) -> Result<(), SecurityError> {
    let ctx = match ctx {
        Some(ctx) if ctx.is_active() => ctx,
        _ => return Err(SecurityError::Unauthenticated),
    };

    if safe_method || ctx.is_elevated() || required.is_empty() {
        return Ok(());
    }

    let allowed = match tenant_slug {
        Some(slug) => can_act_on_tenant(ctx, slug, required),
        None => required.iter().any(|role| has_role(ctx, *role, None)),
    };

    if allowed {
        return Ok(());
    }

    warn!(
        principal_id = %ctx.principal_id(),
        tenant_slug = tenant_slug.unwrap_or("-"),
        ?required,
        "authorization_denied"
    );
    Err(SecurityError::Forbidden(match tenant_slug {
        Some(slug) => format!(
            "requires one of [{}] for vendor '{slug}'",
            role_list(required)
        ),
        None => format!("requires one of [{}]", role_list(required)),
    }))
}

pub fn ensure_role(ctx: &SecurityContext, required: Role, tenant_slug: Option<&str>) -> Result<(), SecurityError> {
    if has_role(ctx, required, tenant_slug) { return Ok(()); }
    warn!(principal_id = %ctx.principal_id(), ?required, tenant_slug, "role_check_failed");
    Err(SecurityError::Forbidden(format!("requires role {required}")))
}

pub fn ensure_any_role(ctx: &SecurityContext, required: &[Role], tenant_slug: Option<&str>) -> Result<(), SecurityError> {
    if required.iter().any(|role| has_role(ctx, *role, tenant_slug)) { return Ok(()); }
    warn!(principal_id = %ctx.principal_id(), ?required, tenant_slug, "any_role_check_failed");
    Err(SecurityError::Forbidden(format!("requires one of [{}]", role_list(required))))
}

fn role_list(roles: &[Role]) -> String {
    roles.iter().map(|role| role.as_str()).collect::<Vec<_>>().join(", ")
}
