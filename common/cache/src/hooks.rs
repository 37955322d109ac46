use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::key::{CacheKey, ResourceType, ALL_RESOURCES};
use crate::listing::ListingCache;

/// A committed write to one of the entities whose listings are cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityWrite {
    /// Tenant created or updated (approval, rejection, profile edits).
    Tenant { slug: String },
    TenantDeleted { slug: String },
    Category { tenant_slug: String },
    Product { tenant_slug: String },
    CartItem { tenant_slug: String, cart_id: Uuid },
    Order { tenant_slug: String },
}

impl EntityWrite {
    /// Keys that must be dropped after this write.
    pub fn affected_keys(&self) -> Vec<CacheKey> {
        let aggregates = || vec![CacheKey::ApprovedTenants, CacheKey::PendingTenants];
        match self {
            EntityWrite::Tenant { .. } => aggregates(),
            EntityWrite::TenantDeleted { slug } => {
                let mut keys = aggregates();
                keys.extend(ALL_RESOURCES.iter().map(|resource| CacheKey::listing(*resource, slug.clone())));
                keys
            }
            EntityWrite::Category { tenant_slug } => vec![CacheKey::listing(ResourceType::Category, tenant_slug.clone())],
            EntityWrite::Product { tenant_slug } => vec![CacheKey::listing(ResourceType::Product, tenant_slug.clone())],
            EntityWrite::CartItem { tenant_slug, .. } => vec![CacheKey::listing(ResourceType::Cart, tenant_slug.clone())],
            EntityWrite::Order { tenant_slug } => vec![CacheKey::listing(ResourceType::Order, tenant_slug.clone())],
        }
    }
}

/// Recomputes a cart's stored total from its current lines and persists it.
///
/// Returns `Ok(None)` when no cart with that id belongs to `tenant_slug`.
#[async_trait]
pub trait CartTotals: Send + Sync {
    async fn recompute_total(&self, tenant_slug: &str, cart_id: Uuid) -> anyhow::Result<Option<BigDecimal>>;
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("cart {cart_id} not found for vendor '{tenant_slug}'")]
    CartNotFound { cart_id: Uuid, tenant_slug: String },
    #[error("failed to recompute total for cart {cart_id}: {source}")]
    CartTotal {
        cart_id: Uuid,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HookReport {
    pub invalidated: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_total: Option<BigDecimal>,
}

/// Post-write hook every entity-mutation path calls once its write commits.
#[derive(Clone)]
pub struct WriteHooks {
    cache: ListingCache,
    cart_totals: Arc<dyn CartTotals>,
}

impl WriteHooks {
    pub fn new(cache: ListingCache, cart_totals: Arc<dyn CartTotals>) -> Self {
        Self { cache, cart_totals }
    }

    pub fn cache(&self) -> &ListingCache {
        &self.cache
    }

    /// Cache failures are swallowed inside [`ListingCache`]; only the cart
    /// total write, which goes to the data store, can fail here. The affected
    /// keys are dropped even when it does.
    pub async fn after_write(&self, write: &EntityWrite) -> Result<HookReport, HookError> {
        let cart_total = match write {
            EntityWrite::CartItem { tenant_slug, cart_id } => Some(self.recompute_cart(tenant_slug, *cart_id).await),
            _ => None,
        };
        let keys = write.affected_keys();
        for key in &keys {
            self.cache.invalidate(key).await;
        }
        let cart_total = cart_total.transpose()?;
        Ok(HookReport { invalidated: keys.iter().map(CacheKey::render).collect(), cart_total })
    }

    async fn recompute_cart(&self, tenant_slug: &str, cart_id: Uuid) -> Result<BigDecimal, HookError> {
        let total = self
            .cart_totals
            .recompute_total(tenant_slug, cart_id)
            .await
            .map_err(|source| HookError::CartTotal { cart_id, source })?
            .ok_or_else(|| HookError::CartNotFound { cart_id, tenant_slug: tenant_slug.to_string() })?;
        info!(cart_id = %cart_id, tenant_slug, total = %total, "cart_total_recomputed");
        Ok(total)
    }
}
