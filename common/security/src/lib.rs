pub mod context;
pub mod error;
pub mod model;
pub mod policy;
pub mod roles;

pub use context::SecurityContext;
pub use error::SecurityError;
pub use model::{Membership, MembershipGrant, Principal, Tenant};
pub use policy::{authorize, can_act_on_tenant, ensure_any_role, ensure_role, has_role, is_safe_method};
pub use roles::{Role, Tier, ALL_ROLES, PLATFORM_STAFF_ROLES, VENDOR_STAFF_ROLES};
