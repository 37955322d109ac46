use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{MembershipGrant, Principal};
use crate::roles::Role;
use crate::SecurityError;

/// Everything the role engine needs to know about one authenticated principal.
///
/// Memberships are indexed by `(principal, tenant)`: lookups never depend on the
/// order rows were loaded in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityContext {
    pub principal: Principal,
    grants: Vec<MembershipGrant>,
    pub trace_id: Option<Uuid>,
}

impl SecurityContext {
    /// Build a context, rejecting grant sets that break the membership invariants
    /// (one platform-tier row, one row per tenant, rows owned by the principal).
    pub fn new(principal: Principal, grants: Vec<MembershipGrant>) -> Result<Self, SecurityError> {
        let mut platform_seen = false;
        let mut tenants_seen: Vec<Uuid> = Vec::with_capacity(grants.len());

        for grant in &grants {
            let membership = &grant.membership;
            if membership.principal_id != principal.id {
                return Err(SecurityError::Internal(format!(
                    "membership {} does not belong to principal {}",
                    membership.id, principal.id
                )));
            }
            match (membership.tenant_id, &grant.tenant) {
                (None, None) => {
                    if platform_seen {
                        return Err(SecurityError::Internal(format!(
                            "principal {} holds more than one platform-tier membership",
                            principal.id
                        )));
                    }
                    platform_seen = true;
                }
                (Some(tenant_id), Some(tenant)) if tenant.id == tenant_id => {
                    if tenants_seen.contains(&tenant_id) {
                        return Err(SecurityError::Internal(format!(
                            "principal {} holds more than one membership in tenant {}",
                            principal.id, tenant_id
                        )));
                    }
                    tenants_seen.push(tenant_id);
                }
                _ => {
                    return Err(SecurityError::Internal(format!(
                        "membership {} is not joined with its tenant",
                        membership.id
                    )));
                }
            }
        }

        Ok(Self { principal, grants, trace_id: None })
    }

    pub fn with_trace_id(mut self, trace_id: Option<Uuid>) -> Self {
        self.trace_id = trace_id;
        self
    }

    pub fn principal_id(&self) -> Uuid {
        self.principal.id
    }

    pub fn is_active(&self) -> bool {
        self.principal.active
    }

    pub fn is_elevated(&self) -> bool {
        self.principal.active && self.principal.elevated
    }

    pub fn grants(&self) -> &[MembershipGrant] {
        &self.grants
    }

    /// The single `(principal, null)` membership, if any.
    pub fn platform_grant(&self) -> Option<&MembershipGrant> {
        self.grants.iter().find(|grant| grant.membership.tenant_id.is_none())
    }

    /// The `(principal, tenant_id)` membership, if any.
    pub fn tenant_grant(&self, tenant_id: Uuid) -> Option<&MembershipGrant> {
        self.grants
            .iter()
            .find(|grant| grant.membership.tenant_id == Some(tenant_id))
    }

    pub fn tenant_grant_by_slug(&self, slug: &str) -> Option<&MembershipGrant> {
        self.grants
            .iter()
            .find(|grant| grant.tenant_slug() == Some(slug))
    }

    /// Tenant-scoped grants whose stored role is `role`, regardless of approval.
    pub fn tenant_grants_with_role(&self, role: Role) -> impl Iterator<Item = &MembershipGrant> {
        self.grants
            .iter()
            .filter(move |grant| grant.tenant.is_some() && grant.membership.role == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Membership, Tenant};

    fn principal() -> Principal {
        Principal { id: Uuid::new_v4(), active: true, elevated: false }
    }

    fn tenant(slug: &str) -> Tenant {
        Tenant { id: Uuid::new_v4(), slug: slug.into(), company_name: slug.into(), approved: true, active: true }
    }

    #[test]
    fn rejects_two_platform_memberships() {
        let p = principal();
        let grants = vec![
            MembershipGrant::platform(Membership::new(p.id, None, Role::User)),
            MembershipGrant::platform(Membership::new(p.id, None, Role::PlatformAgent)),
        ];
        assert!(matches!(SecurityContext::new(p, grants), Err(SecurityError::Internal(_))));
    }

    #[test]
    fn rejects_two_memberships_in_one_tenant() {
        let p = principal();
        let acme = tenant("acme");
        let grants = vec![
            MembershipGrant::scoped(Membership::new(p.id, Some(acme.id), Role::VendorAgent), acme.clone()),
            MembershipGrant::scoped(Membership::new(p.id, Some(acme.id), Role::User), acme),
        ];
        assert!(SecurityContext::new(p, grants).is_err());
    }

    #[test]
    fn rejects_foreign_membership() {
        let p = principal();
        let grants = vec![MembershipGrant::platform(Membership::new(Uuid::new_v4(), None, Role::User))];
        assert!(SecurityContext::new(p, grants).is_err());
    }

    #[test]
    fn lookups_are_keyed_by_tenant_not_order() {
        let p = principal();
        let acme = tenant("acme");
        let globex = tenant("globex");
        let grants = vec![
            MembershipGrant::scoped(Membership::new(p.id, Some(globex.id), Role::VendorAdmin), globex.clone()),
            MembershipGrant::scoped(Membership::new(p.id, Some(acme.id), Role::VendorAgent), acme.clone()),
            MembershipGrant::platform(Membership::new(p.id, None, Role::User)),
        ];
        let ctx = SecurityContext::new(p, grants).unwrap();
        assert_eq!(ctx.tenant_grant(acme.id).unwrap().membership.role, Role::VendorAgent);
        assert_eq!(ctx.tenant_grant_by_slug("globex").unwrap().membership.role, Role::VendorAdmin);
        assert_eq!(ctx.platform_grant().unwrap().membership.role, Role::User);
        assert!(ctx.tenant_grant_by_slug("initech").is_none());
    }
}
