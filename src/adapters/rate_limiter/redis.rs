//! Redis-backed rate limiter for deployments with several instances.
//!
//! Fixed-window counter with INCR + EXPIRE. A counter found without a TTL
//! gets one on the next check, so an EXPIRE lost after INCR cannot pin the
//! key forever.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::config::{ThrottleConfig, ThrottleRule};
use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter,
};

/// Shared counter store for admission throttles.
///
/// 1. INCR the key
/// 2. on the first hit, or whenever the key has no TTL, EXPIRE it after the
///    scope's window
/// 3. deny once the count passes the scope's threshold
///
/// Requests can briefly exceed the threshold across a window boundary.
#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: MultiplexedConnection,
    throttle: ThrottleConfig,
}

fn unavailable(err: redis::RedisError) -> RateLimitError {
    RateLimitError::Unavailable(err.to_string())
}

impl RedisRateLimiter {
    pub fn new(conn: MultiplexedConnection, throttle: ThrottleConfig) -> Self {
        Self { conn, throttle }
    }

    /// Opens a multiplexed connection to `url`.
    pub async fn connect(url: &str, throttle: ThrottleConfig) -> Result<Self, RateLimitError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(unavailable)?;
        Ok(Self::new(conn, throttle))
    }

    async fn seconds_to_reset(
        conn: &mut MultiplexedConnection,
        redis_key: &str,
        rule: ThrottleRule,
    ) -> Result<u64, RateLimitError> {
        let ttl: i64 = conn.ttl(redis_key).await.map_err(unavailable)?;
        Ok(reset_from_ttl(ttl, rule))
    }
}

/// TTL reply for a key that exists without an expiry.
const NO_EXPIRY: i64 = -1;

/// Whether the counter must (re)arm its window expiry after INCR.
fn needs_expiry(count: i64, ttl: i64) -> bool {
    count == 1 || ttl == NO_EXPIRY
}

fn reset_from_ttl(ttl: i64, rule: ThrottleRule) -> u64 {
    if ttl > 0 {
        ttl as u64
    } else {
        u64::from(rule.window_secs)
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let redis_key = key.to_redis_key();
        let rule = self.throttle.rule_for(key.scope);
        let mut conn = self.conn.clone();

        let count: i64 = conn.incr(&redis_key, 1_i64).await.map_err(unavailable)?;
        let ttl: i64 = conn.ttl(&redis_key).await.map_err(unavailable)?;
        let reset_secs = if needs_expiry(count, ttl) {
            if count != 1 {
                tracing::warn!(key = %redis_key, "Rate limit counter had no expiry; re-arming window");
            }
            conn.expire::<_, ()>(&redis_key, i64::from(rule.window_secs))
                .await
                .map_err(unavailable)?;
            u64::from(rule.window_secs)
        } else {
            reset_from_ttl(ttl, rule)
        };
        let count = u32::try_from(count).unwrap_or(u32::MAX);

        if count > rule.requests {
            let retry_after = (reset_secs as u32).max(1);
            return Ok(RateLimitResult::Denied(RateLimitDenied {
                limit: rule.requests,
                retry_after_secs: retry_after,
                scope: key.scope,
                message: format!(
                    "Rate limit exceeded for {}. Retry after {} seconds.",
                    key.scope, retry_after
                ),
            }));
        }

        Ok(RateLimitResult::Allowed(RateLimitStatus {
            limit: rule.requests,
            remaining: rule.requests.saturating_sub(count),
            reset_at: Timestamp::now().plus_secs(reset_secs),
            window_secs: rule.window_secs,
        }))
    }

    async fn status(&self, key: RateLimitKey) -> Result<RateLimitStatus, RateLimitError> {
        let redis_key = key.to_redis_key();
        let rule = self.throttle.rule_for(key.scope);
        let mut conn = self.conn.clone();

        let count: Option<i64> = conn.get(&redis_key).await.map_err(unavailable)?;
        let count = u32::try_from(count.unwrap_or(0)).unwrap_or(u32::MAX);
        let reset_secs = Self::seconds_to_reset(&mut conn, &redis_key, rule).await?;

        Ok(RateLimitStatus {
            limit: rule.requests,
            remaining: rule.requests.saturating_sub(count),
            reset_at: Timestamp::now().plus_secs(reset_secs),
            window_secs: rule.window_secs,
        })
    }

    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key.to_redis_key())
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimiter")
            .field("throttle", &self.throttle)
            .finish_non_exhaustive()
    }
}
