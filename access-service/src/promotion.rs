//! Promotion / demotion of agents.
//!
//! Legal role changes are `user <-> vendor_agent` and `user <-> platform_agent`.
//! Admin roles are never entered or left here. [`plan`] decides the outcome from
//! the actor's and target's memberships; stores call it while holding the
//! target's rows locked so concurrent transitions serialize.

use std::sync::Arc;

use common_observability::AccessMetrics;
use common_security::{Membership, MembershipGrant, Role, SecurityError, Tier};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::MembershipStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Promote,
    Demote,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Promote => "promote",
            Transition::Demote => "demote",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub transition: Transition,
    pub actor_id: Uuid,
    pub target_id: Uuid,
    pub tier: Tier,
    /// Vendor the actor is acting for. Needed when a vendor admin owns several.
    pub tenant_slug: Option<String>,
}

/// Decide the target's new membership row.
///
/// `actor` and `target` are every membership the two principals hold, joined
/// with their tenants. The returned membership keeps the id and principal of
/// the row being rewritten.
pub fn plan(
    request: &TransitionRequest,
    actor: &[MembershipGrant],
    target: &[MembershipGrant],
) -> Result<Membership, SecurityError> {
    if request.actor_id == request.target_id {
        return Err(SecurityError::invalid("Cannot modify your own role."));
    }
    let actor_grant = actor_membership(request, actor)?;
    if target.is_empty() {
        return Err(SecurityError::not_found("Target user has no membership."));
    }

    let actor_tenant = actor_grant.membership.tenant_id;
    let current = resolve_target(request.tier, actor_tenant, target)?;
    let (role, tenant_id) = match request.transition {
        Transition::Promote => promote_to(request.tier, actor_tenant, current)?,
        Transition::Demote => demote_to(request.tier, actor_tenant, current, target)?,
    };

    Ok(Membership { role, tenant_id, ..current.membership.clone() })
}

/// The actor's membership holding the tier's admin role. Suppressed roles do
/// not count: an unapproved vendor's owner is not yet its admin.
fn actor_membership<'a>(
    request: &TransitionRequest,
    grants: &'a [MembershipGrant],
) -> Result<&'a MembershipGrant, SecurityError> {
    let required = request.tier.admin_role();
    let slug = match request.tier {
        Tier::Vendor => request.tenant_slug.as_deref(),
        Tier::Platform => None,
    };
    let candidates: Vec<&MembershipGrant> = grants
        .iter()
        .filter(|grant| grant.effective_role() == required)
        .filter(|grant| slug.map_or(true, |slug| grant.tenant_slug() == Some(slug)))
        .collect();

    match candidates.as_slice() {
        [] => Err(SecurityError::not_found(format!("Actor does not hold the {required} role."))),
        [only] => Ok(only),
        _ => Err(SecurityError::invalid(
            "Actor administers several vendors; specify which vendor to act for.",
        )),
    }
}

/// Pick the target row a transition rewrites.
///
/// Vendor tier: the row in the actor's tenant, else the platform-scoped row,
/// else the lowest foreign row (which then fails the tenant check).
/// Platform tier: the platform-scoped row, else the only tenant row.
fn resolve_target(
    tier: Tier,
    actor_tenant: Option<Uuid>,
    grants: &[MembershipGrant],
) -> Result<&MembershipGrant, SecurityError> {
    let platform_row = grants.iter().find(|grant| grant.membership.tenant_id.is_none());
    match tier {
        Tier::Vendor => actor_tenant
            .and_then(|tenant| grants.iter().find(|grant| grant.membership.tenant_id == Some(tenant)))
            .or(platform_row)
            .or_else(|| grants.iter().min_by_key(|grant| grant.membership.tenant_id))
            .ok_or_else(|| SecurityError::not_found("Target user has no membership.")),
        Tier::Platform => match (platform_row, grants) {
            (Some(row), _) => Ok(row),
            (None, [only]) => Ok(only),
            (None, []) => Err(SecurityError::not_found("Target user has no membership.")),
            (None, _) => Err(SecurityError::invalid(
                "Target holds memberships in several vendors; remove them before assigning a platform role.",
            )),
        },
    }
}

fn promote_to(
    tier: Tier,
    actor_tenant: Option<Uuid>,
    current: &MembershipGrant,
) -> Result<(Role, Option<Uuid>), SecurityError> {
    let role = current.membership.role;
    let destination = tier.agent_role();
    if role == destination {
        return Err(SecurityError::invalid("User already has this role."));
    }

    match tier {
        Tier::Vendor => {
            let tenant = actor_tenant.ok_or_else(|| SecurityError::invalid("Vendor admin has no vendor association."))?;
            check_same_tenant(tenant, current)?;
            if role.is_protected() {
                return Err(SecurityError::invalid(format!("Cannot modify role {role}.")));
            }
            if role == Role::PlatformAgent {
                return Err(SecurityError::invalid("User is a platform agent; remove that role first."));
            }
            Ok((Role::VendorAgent, Some(tenant)))
        }
        Tier::Platform => {
            if role.is_protected() {
                return Err(SecurityError::invalid(format!("Cannot modify role {role}.")));
            }
            if role == Role::VendorAgent {
                return Err(SecurityError::invalid("User is a vendor agent; remove that role first."));
            }
            Ok((Role::PlatformAgent, None))
        }
    }
}

fn demote_to(
    tier: Tier,
    actor_tenant: Option<Uuid>,
    current: &MembershipGrant,
    all: &[MembershipGrant],
) -> Result<(Role, Option<Uuid>), SecurityError> {
    let role = current.membership.role;
    if !role.is_agent() {
        return Err(SecurityError::invalid("User is not an agent."));
    }

    if tier == Tier::Vendor {
        let tenant = actor_tenant.ok_or_else(|| SecurityError::invalid("Vendor admin has no vendor association."))?;
        if current.membership.tenant_id.is_none() {
            return Err(SecurityError::forbidden("Vendor admins cannot change platform roles."));
        }
        check_same_tenant(tenant, current)?;
    }

    // The platform-scoped slot is unique; a row cannot move into it when taken.
    let platform_slot_taken = current.membership.tenant_id.is_some()
        && all.iter().any(|grant| grant.membership.tenant_id.is_none());
    let tenant_id = if platform_slot_taken { current.membership.tenant_id } else { None };
    Ok((Role::User, tenant_id))
}

fn check_same_tenant(actor_tenant: Uuid, current: &MembershipGrant) -> Result<(), SecurityError> {
    match current.membership.tenant_id {
        Some(tenant) if tenant != actor_tenant => Err(SecurityError::forbidden("User belongs to another vendor.")),
        _ => Ok(()),
    }
}

/// Entry point for the agent-management endpoints.
#[derive(Clone)]
pub struct MembershipService {
    store: Arc<dyn MembershipStore>,
    metrics: Option<Arc<AccessMetrics>>,
}

impl MembershipService {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self { store, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<AccessMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn promote(
        &self,
        actor_id: Uuid,
        target_id: Uuid,
        tier: Tier,
        tenant_slug: Option<String>,
    ) -> Result<Membership, SecurityError> {
        self.run(TransitionRequest { transition: Transition::Promote, actor_id, target_id, tier, tenant_slug })
            .await
    }

    pub async fn demote(
        &self,
        actor_id: Uuid,
        target_id: Uuid,
        tier: Tier,
        tenant_slug: Option<String>,
    ) -> Result<Membership, SecurityError> {
        self.run(TransitionRequest { transition: Transition::Demote, actor_id, target_id, tier, tenant_slug })
            .await
    }

    pub async fn run(&self, request: TransitionRequest) -> Result<Membership, SecurityError> {
        let result = self.store.apply_transition(&request).await;
        let outcome = match &result {
            Ok(membership) => {
                info!(
                    operation = request.transition.as_str(),
                    principal_id = %request.actor_id,
                    target_id = %request.target_id,
                    role = %membership.role,
                    tenant_id = ?membership.tenant_id,
                    "membership_transition_applied"
                );
                "ok"
            }
            Err(err) => {
                warn!(
                    operation = request.transition.as_str(),
                    principal_id = %request.actor_id,
                    target_id = %request.target_id,
                    tier = request.tier.as_str(),
                    error = %err,
                    "membership_transition_rejected"
                );
                err.kind()
            }
        };
        if let Some(metrics) = &self.metrics {
            metrics.transition(request.transition.as_str(), outcome);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_security::{Principal, Tenant};

    fn tenant(slug: &str) -> Tenant {
        Tenant { id: Uuid::new_v4(), slug: slug.into(), company_name: slug.into(), approved: true, active: true }
    }

    fn row(principal: Uuid, tenant: Option<&Tenant>, role: Role) -> MembershipGrant {
        match tenant {
            Some(tenant) => MembershipGrant::scoped(Membership::new(principal, Some(tenant.id), role), tenant.clone()),
            None => MembershipGrant::platform(Membership::new(principal, None, role)),
        }
    }

    fn request(transition: Transition, actor: Uuid, target: Uuid, tier: Tier) -> TransitionRequest {
        TransitionRequest { transition, actor_id: actor, target_id: target, tier, tenant_slug: None }
    }

    #[test]
    fn vendor_promotion_moves_platform_user_into_actor_tenant() {
        let acme = tenant("acme");
        let (admin, user) = (Uuid::new_v4(), Uuid::new_v4());
        let actor = vec![row(admin, Some(&acme), Role::VendorAdmin)];
        let target = vec![row(user, None, Role::User)];
        let updated = plan(&request(Transition::Promote, admin, user, Tier::Vendor), &actor, &target).unwrap();
        assert_eq!(updated.role, Role::VendorAgent);
        assert_eq!(updated.tenant_id, Some(acme.id));
        assert_eq!(updated.id, target[0].membership.id);
    }

    #[test]
    fn vendor_actor_cannot_reach_other_tenant() {
        let (acme, globex) = (tenant("acme"), tenant("globex"));
        let (admin, user) = (Uuid::new_v4(), Uuid::new_v4());
        let actor = vec![row(admin, Some(&acme), Role::VendorAdmin)];
        let target = vec![row(user, Some(&globex), Role::User)];
        let err = plan(&request(Transition::Promote, admin, user, Tier::Vendor), &actor, &target).unwrap_err();
        assert!(matches!(err, SecurityError::Forbidden(_)));
    }

    #[test]
    fn unapproved_owner_is_not_an_actor() {
        let mut acme = tenant("acme");
        acme.approved = false;
        let (admin, user) = (Uuid::new_v4(), Uuid::new_v4());
        let actor = vec![row(admin, Some(&acme), Role::VendorAdmin)];
        let target = vec![row(user, None, Role::User)];
        let err = plan(&request(Transition::Promote, admin, user, Tier::Vendor), &actor, &target).unwrap_err();
        assert!(matches!(err, SecurityError::NotFound(_)));
    }

    #[test]
    fn owner_of_two_vendors_must_name_one() {
        let (acme, globex) = (tenant("acme"), tenant("globex"));
        let (admin, user) = (Uuid::new_v4(), Uuid::new_v4());
        let actor = vec![row(admin, Some(&acme), Role::VendorAdmin), row(admin, Some(&globex), Role::VendorAdmin)];
        let target = vec![row(user, None, Role::User)];
        let mut req = request(Transition::Promote, admin, user, Tier::Vendor);
        assert!(matches!(plan(&req, &actor, &target), Err(SecurityError::InvalidOperation(_))));

        req.tenant_slug = Some("globex".into());
        assert_eq!(plan(&req, &actor, &target).unwrap().tenant_id, Some(globex.id));
    }

    #[test]
    fn platform_admin_cannot_touch_vendor_owner() {
        let acme = tenant("acme");
        let (admin, owner) = (Uuid::new_v4(), Uuid::new_v4());
        let actor = vec![row(admin, None, Role::PlatformAdmin)];
        let target = vec![row(owner, Some(&acme), Role::VendorAdmin)];
        for transition in [Transition::Promote, Transition::Demote] {
            let err = plan(&request(transition, admin, owner, Tier::Platform), &actor, &target).unwrap_err();
            assert!(matches!(err, SecurityError::InvalidOperation(_)), "{transition:?}: {err:?}");
        }
    }

    #[test]
    fn demotion_clears_tenant_unless_platform_slot_is_taken() {
        let acme = tenant("acme");
        let (admin, agent) = (Uuid::new_v4(), Uuid::new_v4());
        let actor = vec![row(admin, Some(&acme), Role::VendorAdmin)];

        let lone = vec![row(agent, Some(&acme), Role::VendorAgent)];
        let updated = plan(&request(Transition::Demote, admin, agent, Tier::Vendor), &actor, &lone).unwrap();
        assert_eq!((updated.role, updated.tenant_id), (Role::User, None));

        let with_platform_row = vec![row(agent, None, Role::User), row(agent, Some(&acme), Role::VendorAgent)];
        let updated = plan(&request(Transition::Demote, admin, agent, Tier::Vendor), &actor, &with_platform_row).unwrap();
        assert_eq!((updated.role, updated.tenant_id), (Role::User, Some(acme.id)));
    }

    #[test]
    fn vendor_admin_cannot_demote_platform_agent() {
        let acme = tenant("acme");
        let (admin, agent) = (Uuid::new_v4(), Uuid::new_v4());
        let actor = vec![row(admin, Some(&acme), Role::VendorAdmin)];
        let target = vec![row(agent, None, Role::PlatformAgent)];
        let err = plan(&request(Transition::Demote, admin, agent, Tier::Vendor), &actor, &target).unwrap_err();
        assert!(matches!(err, SecurityError::Forbidden(_)));
    }

    #[test]
    fn self_modification_is_rejected_before_anything_else() {
        let principal = Principal { id: Uuid::new_v4(), active: true, elevated: false };
        for tier in [Tier::Vendor, Tier::Platform] {
            for transition in [Transition::Promote, Transition::Demote] {
                let err = plan(&request(transition, principal.id, principal.id, tier), &[], &[]).unwrap_err();
                assert_eq!(err, SecurityError::invalid("Cannot modify your own role."));
            }
        }
    }
}
