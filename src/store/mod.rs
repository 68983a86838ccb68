//! Short-lived key/value state: rate-limit counters and wallet link codes.
//!
//! Callers depend on the `KvStore` trait only, so the in-memory map can be
//! replaced by a durable store without touching them.

pub mod link;
pub mod memory;
pub mod rate_limit;

use std::time::Duration;

use async_trait::async_trait;

pub use link::LinkCodes;
pub use memory::MemoryStore;
pub use rate_limit::RateLimiter;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;

    /// Insert or overwrite. `ttl = None` keeps the entry until removed.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>);

    /// Remove and return the previous value.
    async fn remove(&self, key: &str) -> Option<String>;

    /// Reset the TTL of a live entry. Returns false when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> bool;

    /// Increment a counter, creating it at 1 with `ttl` when absent.
    async fn incr(&self, key: &str, ttl: Duration) -> u64;
}
