//! # Cache Module
//!
//! Optional read-through cache in front of the repositories.
//!
//! - [`CacheService`]: the key-value store seam
//! - [`CacheProvider`]: the store chosen at startup (Redis, in-memory or NoOp)
//! - [`CacheAside`]: `get_or_load` / `invalidate` on top of any store, gated by
//!   the cache feature flag
//! - [`CacheKeys`]: key layout per resource family

pub mod aside;
pub mod errors;
pub mod keys;
pub mod provider;
pub mod providers;
pub mod traits;

pub use aside::{CacheAside, CacheLookup};
pub use errors::{CacheError, CacheResult};
pub use keys::CacheKeys;
pub use provider::CacheProvider;
pub use providers::{InMemoryCacheService, NoOpCacheService};
pub use traits::CacheService;

#[cfg(feature = "cache-redis")]
pub use providers::RedisCacheService;
