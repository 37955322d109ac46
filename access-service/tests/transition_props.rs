use access_service::promotion::{plan, Transition, TransitionRequest};
use common_security::{Membership, MembershipGrant, Role, SecurityError, Tenant, Tier};
use proptest::prelude::*;
use uuid::Uuid;

fn any_role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::User),
        Just(Role::VendorAgent),
        Just(Role::VendorAdmin),
        Just(Role::PlatformAgent),
        Just(Role::PlatformAdmin),
    ]
}

fn any_tier() -> impl Strategy<Value = Tier> {
    prop_oneof![Just(Tier::Platform), Just(Tier::Vendor)]
}

fn any_transition() -> impl Strategy<Value = Transition> {
    prop_oneof![Just(Transition::Promote), Just(Transition::Demote)]
}

fn tenant(slug: &str) -> Tenant {
    Tenant { id: Uuid::new_v4(), slug: slug.into(), company_name: slug.into(), approved: true, active: true }
}

fn grant(principal: Uuid, tenant: Option<&Tenant>, role: Role) -> MembershipGrant {
    let membership = Membership::new(principal, tenant.map(|tenant| tenant.id), role);
    match tenant {
        Some(tenant) => MembershipGrant::scoped(membership, tenant.clone()),
        None => MembershipGrant::platform(membership),
    }
}

proptest! {
    #[test]
    fn nobody_changes_their_own_membership(
        roles in proptest::collection::vec((any_role(), any::<bool>()), 0..4),
        tier in any_tier(),
        transition in any_transition(),
    ) {
        let acme = tenant("acme");
        let principal = Uuid::new_v4();
        let grants: Vec<MembershipGrant> = roles
            .into_iter()
            .map(|(role, scoped)| {
                let scoped = (scoped && role.accepts_tenant(true)) || !role.accepts_tenant(false);
                grant(principal, scoped.then_some(&acme), role)
            })
            .collect();
        let request = TransitionRequest {
            transition,
            actor_id: principal,
            target_id: principal,
            tier,
            tenant_slug: None,
        };
        let err = plan(&request, &grants, &grants).unwrap_err();
        prop_assert_eq!(err, SecurityError::invalid("Cannot modify your own role."));
    }

    #[test]
    fn vendor_admins_never_reach_other_tenants(
        target_role in prop_oneof![Just(Role::User), Just(Role::VendorAgent), Just(Role::VendorAdmin)],
        transition in any_transition(),
    ) {
        let (acme, globex) = (tenant("acme"), tenant("globex"));
        let (actor, target) = (Uuid::new_v4(), Uuid::new_v4());
        let actor_grants = vec![grant(actor, Some(&acme), Role::VendorAdmin)];
        let target_grants = vec![grant(target, Some(&globex), target_role)];
        let request = TransitionRequest { transition, actor_id: actor, target_id: target, tier: Tier::Vendor, tenant_slug: None };
        prop_assert!(plan(&request, &actor_grants, &target_grants).is_err());
    }

    #[test]
    fn vendor_promotion_never_exceeds_agent(target_role in any_role()) {
        let acme = tenant("acme");
        let (actor, target) = (Uuid::new_v4(), Uuid::new_v4());
        let actor_grants = vec![grant(actor, Some(&acme), Role::VendorAdmin)];
        let scoped = target_role.accepts_tenant(true);
        let target_grants = vec![grant(target, scoped.then_some(&acme), target_role)];
        let request = TransitionRequest {
            transition: Transition::Promote,
            actor_id: actor,
            target_id: target,
            tier: Tier::Vendor,
            tenant_slug: None,
        };
        if let Ok(updated) = plan(&request, &actor_grants, &target_grants) {
            prop_assert_eq!(updated.role, Role::VendorAgent);
            prop_assert_eq!(updated.tenant_id, Some(acme.id));
        }
    }
}
