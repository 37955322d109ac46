use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use common_cache::CartTotals;
use common_money::{cart_total, LineItem};
use common_security::{Membership, MembershipGrant, Principal, Role, SecurityError, Tenant};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    already_registered, slug_taken, IdentityStore, MembershipStore, NewTenant, StoreResult, TenantFilter, TenantStore,
};
use crate::promotion::{self, TransitionRequest};

#[derive(Debug, Clone)]
pub struct MemoryCart {
    pub tenant_id: Uuid,
    pub lines: Vec<LineItem>,
    pub total: BigDecimal,
}

#[derive(Default)]
struct State {
    principals: HashMap<Uuid, Principal>,
    tenants: HashMap<Uuid, Tenant>,
    memberships: Vec<Membership>,
    carts: HashMap<Uuid, MemoryCart>,
}

impl State {
    fn grants_for(&self, principal_id: Uuid) -> Vec<MembershipGrant> {
        let mut grants: Vec<MembershipGrant> = self
            .memberships
            .iter()
            .filter(|membership| membership.principal_id == principal_id)
            .filter_map(|membership| match membership.tenant_id {
                None => Some(MembershipGrant::platform(membership.clone())),
                Some(tenant_id) => self
                    .tenants
                    .get(&tenant_id)
                    .map(|tenant| MembershipGrant::scoped(membership.clone(), tenant.clone())),
            })
            .collect();
        grants.sort_by_key(|grant| grant.membership.tenant_id);
        grants
    }

    fn slot_taken(&self, principal_id: Uuid, tenant_id: Option<Uuid>) -> bool {
        self.memberships
            .iter()
            .any(|membership| membership.principal_id == principal_id && membership.tenant_id == tenant_id)
    }

    fn tenant_id_by_slug(&self, slug: &str) -> Option<Uuid> {
        self.tenants.values().find(|tenant| tenant.slug == slug).map(|tenant| tenant.id)
    }
}

/// Single-lock store backing every trait. The lock is held for the whole of
/// each operation, which makes transitions serialize like the row lock does.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_principal(&self, principal: Principal) {
        self.inner.lock().await.principals.insert(principal.id, principal);
    }

    pub async fn add_tenant(&self, tenant: Tenant) {
        self.inner.lock().await.tenants.insert(tenant.id, tenant);
    }

    pub async fn set_principal_active(&self, principal_id: Uuid, active: bool) {
        if let Some(principal) = self.inner.lock().await.principals.get_mut(&principal_id) {
            principal.active = active;
        }
    }

    pub async fn set_tenant_active(&self, slug: &str, active: bool) {
        let mut state = self.inner.lock().await;
        if let Some(tenant) = state.tenants.values_mut().find(|tenant| tenant.slug == slug) {
            tenant.active = active;
        }
    }

    /// Inserts a membership row, enforcing the `(principal, tenant)` uniqueness.
    pub async fn add_membership(&self, membership: Membership) -> StoreResult<Membership> {
        let mut state = self.inner.lock().await;
        if state.slot_taken(membership.principal_id, membership.tenant_id) {
            return Err(SecurityError::invalid("Membership already exists for this scope."));
        }
        state.memberships.push(membership.clone());
        Ok(membership)
    }

    pub async fn memberships_of(&self, principal_id: Uuid) -> Vec<Membership> {
        let state = self.inner.lock().await;
        state.grants_for(principal_id).into_iter().map(|grant| grant.membership).collect()
    }

    pub async fn add_cart(&self, cart_id: Uuid, tenant_id: Uuid, lines: Vec<LineItem>) {
        let cart = MemoryCart { tenant_id, lines, total: BigDecimal::from(0) };
        self.inner.lock().await.carts.insert(cart_id, cart);
    }

    pub async fn cart(&self, cart_id: Uuid) -> Option<MemoryCart> {
        self.inner.lock().await.carts.get(&cart_id).cloned()
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn principal(&self, id: Uuid) -> StoreResult<Option<Principal>> {
        Ok(self.inner.lock().await.principals.get(&id).cloned())
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn tenant_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>> {
        let state = self.inner.lock().await;
        Ok(state.tenants.values().find(|tenant| tenant.slug == slug).cloned())
    }

    async fn list_tenants(&self, filter: TenantFilter) -> StoreResult<Vec<Tenant>> {
        let state = self.inner.lock().await;
        let mut tenants: Vec<Tenant> = state.tenants.values().filter(|tenant| filter.matches(tenant)).cloned().collect();
        tenants.sort_by(|a, b| a.company_name.cmp(&b.company_name).then_with(|| a.slug.cmp(&b.slug)));
        Ok(tenants)
    }

    async fn create_tenant(&self, owner_id: Uuid, new: NewTenant) -> StoreResult<(Tenant, Membership)> {
        let mut state = self.inner.lock().await;
        if state.tenant_id_by_slug(&new.slug).is_some() {
            return Err(slug_taken(&new.slug));
        }
        let tenant = Tenant {
            id: Uuid::new_v4(),
            slug: new.slug,
            company_name: new.company_name,
            approved: false,
            active: true,
        };
        let membership = Membership::new(owner_id, Some(tenant.id), Role::VendorAdmin);
        state.tenants.insert(tenant.id, tenant.clone());
        state.memberships.push(membership.clone());
        Ok((tenant, membership))
    }

    async fn set_approved(&self, slug: &str, approved: bool) -> StoreResult<Option<Tenant>> {
        let mut state = self.inner.lock().await;
        let Some(tenant) = state.tenants.values_mut().find(|tenant| tenant.slug == slug) else {
            return Ok(None);
        };
        tenant.approved = approved;
        Ok(Some(tenant.clone()))
    }

    async fn delete_tenant(&self, slug: &str) -> StoreResult<bool> {
        let mut state = self.inner.lock().await;
        let Some(tenant_id) = state.tenant_id_by_slug(slug) else {
            return Ok(false);
        };
        state.tenants.remove(&tenant_id);
        state.memberships.retain(|membership| membership.tenant_id != Some(tenant_id));
        state.carts.retain(|_, cart| cart.tenant_id != tenant_id);
        Ok(true)
    }
}

#[async_trait]
impl MembershipStore for MemoryStore {
    async fn grants_for(&self, principal_id: Uuid) -> StoreResult<Vec<MembershipGrant>> {
        Ok(self.inner.lock().await.grants_for(principal_id))
    }

    async fn register(&self, principal_id: Uuid) -> StoreResult<Membership> {
        let mut state = self.inner.lock().await;
        if state.slot_taken(principal_id, None) {
            return Err(already_registered());
        }
        let membership = Membership::new(principal_id, None, Role::User);
        state.memberships.push(membership.clone());
        Ok(membership)
    }

    async fn apply_transition(&self, request: &TransitionRequest) -> StoreResult<Membership> {
        let mut state = self.inner.lock().await;
        let actor = state.grants_for(request.actor_id);
        let target = state.grants_for(request.target_id);
        let updated = promotion::plan(request, &actor, &target)?;
        let row = state
            .memberships
            .iter_mut()
            .find(|membership| membership.id == updated.id)
            .ok_or_else(|| SecurityError::internal(format!("membership {} disappeared mid-transition", updated.id)))?;
        *row = updated.clone();
        Ok(updated)
    }
}

#[async_trait]
impl CartTotals for MemoryStore {
    async fn recompute_total(&self, tenant_slug: &str, cart_id: Uuid) -> anyhow::Result<Option<BigDecimal>> {
        let mut state = self.inner.lock().await;
        let Some(tenant_id) = state.tenant_id_by_slug(tenant_slug) else {
            return Ok(None);
        };
        let Some(cart) = state.carts.get_mut(&cart_id).filter(|cart| cart.tenant_id == tenant_id) else {
            return Ok(None);
        };
        cart.total = cart_total(&cart.lines);
        Ok(Some(cart.total.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_tenant_rejects_taken_slug_and_seeds_owner() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let new = NewTenant { slug: "acme".into(), company_name: "Acme".into() };
        let (tenant, membership) = store.create_tenant(owner, new.clone()).await.unwrap();
        assert!(!tenant.approved && tenant.active);
        assert_eq!(membership.role, Role::VendorAdmin);
        assert_eq!(membership.tenant_id, Some(tenant.id));

        let err = store.create_tenant(Uuid::new_v4(), new).await.unwrap_err();
        assert!(matches!(err, SecurityError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn delete_tenant_cascades_memberships() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        store.register(owner).await.unwrap();
        store
            .create_tenant(owner, NewTenant { slug: "acme".into(), company_name: "Acme".into() })
            .await
            .unwrap();
        assert_eq!(store.grants_for(owner).await.unwrap().len(), 2);

        assert!(store.delete_tenant("acme").await.unwrap());
        assert!(!store.delete_tenant("acme").await.unwrap());
        let remaining = store.memberships_of(owner).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].tenant_id, None);
    }

    #[tokio::test]
    async fn cart_totals_are_scoped_to_the_owning_vendor() {
        let store = MemoryStore::new();
        let mut tenant_ids = Vec::new();
        for slug in ["acme", "globex"] {
            let tenant = Tenant { id: Uuid::new_v4(), slug: slug.into(), company_name: slug.into(), approved: true, active: true };
            tenant_ids.push(tenant.id);
            store.add_tenant(tenant).await;
        }
        let cart_id = Uuid::new_v4();
        let line = LineItem { price: BigDecimal::from(12), discount_pct: None, quantity: 2 };
        store.add_cart(cart_id, tenant_ids[1], vec![line]).await;

        assert_eq!(store.recompute_total("acme", cart_id).await.unwrap(), None);
        assert_eq!(store.recompute_total("initech", cart_id).await.unwrap(), None);
        assert_eq!(store.cart(cart_id).await.unwrap().total, BigDecimal::from(0));

        assert_eq!(store.recompute_total("globex", cart_id).await.unwrap(), Some(BigDecimal::from(24)));
    }

    #[tokio::test]
    async fn register_twice_is_invalid() {
        let store = MemoryStore::new();
        let principal = Uuid::new_v4();
        store.register(principal).await.unwrap();
        assert_eq!(store.register(principal).await.unwrap_err(), already_registered());
    }
}
