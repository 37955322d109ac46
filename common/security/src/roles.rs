use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::SecurityError;

/// Scope a role is valid in. `User` belongs to neither tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Platform,
    Vendor,
}

impl Tier {
    /// The administrative role an actor must hold to manage agents of this tier.
    pub fn admin_role(self) -> Role {
        match self {
            Tier::Platform => Role::PlatformAdmin,
            Tier::Vendor => Role::VendorAdmin,
        }
    }

    /// Destination role of a promotion performed by this tier's admin.
    pub fn agent_role(self) -> Role {
        match self {
            Tier::Platform => Role::PlatformAgent,
            Tier::Vendor => Role::VendorAgent,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Platform => "platform",
            Tier::Vendor => "vendor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    VendorAgent,
    VendorAdmin,
    PlatformAgent,
    PlatformAdmin,
}

pub const ALL_ROLES: &[Role] = &[
    Role::User,
    Role::VendorAgent,
    Role::VendorAdmin,
    Role::PlatformAgent,
    Role::PlatformAdmin,
];

pub const VENDOR_STAFF_ROLES: &[Role] = &[Role::VendorAdmin, Role::VendorAgent];
pub const PLATFORM_STAFF_ROLES: &[Role] = &[Role::PlatformAdmin, Role::PlatformAgent];

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::VendorAgent => "vendor_agent",
            Role::VendorAdmin => "vendor_admin",
            Role::PlatformAgent => "platform_agent",
            Role::PlatformAdmin => "platform_admin",
        }
    }

    pub fn tier(self) -> Option<Tier> {
        match self {
            Role::User => None,
            Role::VendorAgent | Role::VendorAdmin => Some(Tier::Vendor),
            Role::PlatformAgent | Role::PlatformAdmin => Some(Tier::Platform),
        }
    }

    pub fn is_agent(self) -> bool {
        matches!(self, Role::VendorAgent | Role::PlatformAgent)
    }

    /// Admin roles are only created by tenant creation or out-of-band provisioning.
    pub fn is_protected(self) -> bool {
        matches!(self, Role::VendorAdmin | Role::PlatformAdmin)
    }

    /// Whether a membership holding this role may (or must) carry a tenant.
    pub fn accepts_tenant(self, has_tenant: bool) -> bool {
        match self.tier() {
            Some(Tier::Vendor) => has_tenant,
            Some(Tier::Platform) => !has_tenant,
            None => true,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "vendor_agent" => Ok(Role::VendorAgent),
            "vendor_admin" => Ok(Role::VendorAdmin),
            "platform_agent" => Ok(Role::PlatformAgent),
            "platform_admin" => Ok(Role::PlatformAdmin),
            other => Err(SecurityError::InvalidOperation(format!("unknown role '{other}'"))),
        }
    }
}
