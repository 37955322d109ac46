use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roles::Role;

/// Identity as seen by the core. Owned by the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub active: bool,
    /// Superuser flag; bypasses every role and tenant check.
    pub elevated: bool,
}

/// A vendor organisation, the unit of data isolation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub slug: String,
    pub company_name: String,
    pub approved: bool,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub role: Role,
}

impl Membership {
    pub fn new(principal_id: Uuid, tenant_id: Option<Uuid>, role: Role) -> Self {
        Self { id: Uuid::new_v4(), principal_id, tenant_id, role }
    }

    pub fn is_platform_scoped(&self) -> bool {
        self.tenant_id.is_none()
    }
}

/// A membership joined with the tenant it points at, as loaded for one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipGrant {
    pub membership: Membership,
    pub tenant: Option<Tenant>,
}

impl MembershipGrant {
    pub fn platform(membership: Membership) -> Self {
        Self { membership, tenant: None }
    }

    pub fn scoped(membership: Membership, tenant: Tenant) -> Self {
        Self { membership, tenant: Some(tenant) }
    }

    pub fn tenant_slug(&self) -> Option<&str> {
        self.tenant.as_ref().map(|tenant| tenant.slug.as_str())
    }

    /// Role used for authorization. Vendor-tier roles are suppressed to `User`
    /// while the owning tenant is unapproved or deactivated.
    pub fn effective_role(&self) -> Role {
        let role = self.membership.role;
        match (&self.tenant, role) {
            (Some(tenant), Role::VendorAdmin) if !tenant.approved || !tenant.active => Role::User,
            (Some(tenant), Role::VendorAgent) if !tenant.active => Role::User,
            _ => role,
        }
    }
}
