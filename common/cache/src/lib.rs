pub mod backend;
pub mod hooks;
pub mod key;
pub mod listing;

pub use backend::{CacheBackend, InMemoryCacheBackend, RedisCacheBackend};
pub use hooks::{CartTotals, EntityWrite, HookError, HookReport, WriteHooks};
pub use key::{CacheKey, ResourceType, ALL_RESOURCES, DEFAULT_TTL};
pub use listing::{CacheError, ListingCache};
