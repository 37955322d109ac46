//! Persistence seams. Postgres in production, [`MemoryStore`] in tests and
//! local runs. Data-store failures surface as `SecurityError::Internal`.

use async_trait::async_trait;
use common_security::{Membership, MembershipGrant, Principal, SecurityError, Tenant};
use uuid::Uuid;

use crate::promotion::TransitionRequest;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, SecurityError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantFilter {
    All,
    Approved,
    Pending,
}

impl TenantFilter {
    pub fn matches(self, tenant: &Tenant) -> bool {
        match self {
            TenantFilter::All => true,
            TenantFilter::Approved => tenant.approved,
            TenantFilter::Pending => !tenant.approved,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTenant {
    pub slug: String,
    pub company_name: String,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn principal(&self, id: Uuid) -> StoreResult<Option<Principal>>;
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn tenant_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>>;
    /// Ordered by company name.
    async fn list_tenants(&self, filter: TenantFilter) -> StoreResult<Vec<Tenant>>;
    /// Inserts the tenant (unapproved, active) and the owner's `vendor_admin`
    /// membership in one unit. A taken slug is `InvalidOperation`.
    async fn create_tenant(&self, owner_id: Uuid, tenant: NewTenant) -> StoreResult<(Tenant, Membership)>;
    async fn set_approved(&self, slug: &str, approved: bool) -> StoreResult<Option<Tenant>>;
    /// Removes the tenant and its memberships. `false` when the slug is unknown.
    async fn delete_tenant(&self, slug: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Every membership of the principal joined with its tenant, platform row first.
    async fn grants_for(&self, principal_id: Uuid) -> StoreResult<Vec<MembershipGrant>>;
    /// Self-registration: the `(principal, null, user)` row.
    async fn register(&self, principal_id: Uuid) -> StoreResult<Membership>;
    /// Atomic read-check-write of one target row, decided by [`crate::promotion::plan`].
    async fn apply_transition(&self, request: &TransitionRequest) -> StoreResult<Membership>;
}

pub(crate) fn already_registered() -> SecurityError {
    SecurityError::invalid("User is already registered.")
}

pub(crate) fn slug_taken(slug: &str) -> SecurityError {
    SecurityError::invalid(format!("A vendor with slug '{slug}' already exists."))
}
