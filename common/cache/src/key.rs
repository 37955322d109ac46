use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

pub const APPROVED_TENANTS_KEY: &str = "approvedTenantsList";
pub const PENDING_TENANTS_KEY: &str = "pendingTenantsList";

/// Tenant-scoped entity kinds that get a cached listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Category,
    Product,
    Cart,
    Order,
}

pub const ALL_RESOURCES: &[ResourceType] = &[
    ResourceType::Category,
    ResourceType::Product,
    ResourceType::Cart,
    ResourceType::Order,
];

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Category => "category",
            ResourceType::Product => "product",
            ResourceType::Cart => "cart",
            ResourceType::Order => "order",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_RESOURCES
            .iter()
            .copied()
            .find(|resource| resource.as_str() == s)
            .ok_or_else(|| format!("unknown resource type '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// One shard per (resource, tenant).
    Listing { resource: ResourceType, tenant_slug: String },
    ApprovedTenants,
    PendingTenants,
}

impl CacheKey {
    pub fn listing(resource: ResourceType, tenant_slug: impl Into<String>) -> Self {
        CacheKey::Listing { resource, tenant_slug: tenant_slug.into() }
    }

    pub fn render(&self) -> String {
        match self {
            CacheKey::Listing { resource, tenant_slug } => format!("{resource}_list:{tenant_slug}"),
            CacheKey::ApprovedTenants => APPROVED_TENANTS_KEY.to_string(),
            CacheKey::PendingTenants => PENDING_TENANTS_KEY.to_string(),
        }
    }

    /// Label for the invalidation counter.
    pub fn kind(&self) -> &'static str {
        match self {
            CacheKey::Listing { .. } => "listing",
            CacheKey::ApprovedTenants | CacheKey::PendingTenants => "aggregate",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
