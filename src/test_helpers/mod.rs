//! # Test Helpers
//!
//! In-process stand-ins for Postgres, the cache store and a Redis server,
//! used by the unit tests in this crate and by the scenario tests under
//! `tests/`.

pub mod backend;
pub mod cache;
pub mod fake_redis;

pub use backend::InMemoryBackend;
pub use cache::UnreachableCacheService;
pub use fake_redis::FakeRedisServer;
