//! Rate limiter adapters.
//!
//! - `InMemoryRateLimiter` - single process, tests and development
//! - `RedisRateLimiter` - shared counters across instances
//!
//! Both read their per-scope thresholds from [`crate::config::ThrottleConfig`].

mod in_memory;
mod redis;

pub use in_memory::InMemoryRateLimiter;
pub use redis::RedisRateLimiter;
