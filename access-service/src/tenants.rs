use common_security::{SecurityContext, Tenant, Tier};

/// URL-safe slug: lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(company_name: &str) -> String {
    let mut slug = String::with_capacity(company_name.len());
    let mut pending_dash = false;
    for ch in company_name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Does the caller see every tenant? Elevated principals and platform-tier
/// memberships do.
pub fn sees_all_tenants(ctx: &SecurityContext) -> bool {
    ctx.is_elevated()
        || ctx
            .platform_grant()
            .map(|grant| grant.effective_role().tier() == Some(Tier::Platform))
            .unwrap_or(false)
}

/// Tenants the caller holds a vendor-tier membership in, approved or not.
pub fn own_tenants(ctx: &SecurityContext) -> Vec<Tenant> {
    let mut tenants: Vec<Tenant> = ctx
        .grants()
        .iter()
        .filter(|grant| grant.membership.role.tier() == Some(Tier::Vendor))
        .filter_map(|grant| grant.tenant.clone())
        .collect();
    tenants.sort_by(|a, b| a.company_name.cmp(&b.company_name));
    tenants
}
