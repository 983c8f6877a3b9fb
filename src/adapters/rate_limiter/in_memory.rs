//! In-memory rate limiter for tests and single-instance deployments.
//!
//! Fixed-window counters in a HashMap. Counters are not shared between
//! processes; use the Redis limiter when running several instances.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::ThrottleConfig;
use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter,
};

#[derive(Debug, Clone)]
pub struct InMemoryRateLimiter {
    throttle: ThrottleConfig,
    windows: Arc<RwLock<HashMap<String, WindowState>>>,
}

#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: u64,
    window_secs: u32,
}

impl WindowState {
    fn window_end(&self) -> u64 {
        self.window_start + u64::from(self.window_secs)
    }
}

impl InMemoryRateLimiter {
    pub fn new(throttle: ThrottleConfig) -> Self {
        Self {
            throttle,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ThrottleConfig::default())
    }

    fn now_secs() -> u64 {
        Timestamp::now().as_unix_secs()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let rule = self.throttle.rule_for(key.scope);
        let now = Self::now_secs();

        let mut windows = self.windows.write().await;
        let state = windows.entry(key.to_redis_key()).or_insert_with(|| WindowState {
            count: 0,
            window_start: now,
            window_secs: rule.window_secs,
        });

        if now >= state.window_end() {
            state.count = 0;
            state.window_start = now;
            state.window_secs = rule.window_secs;
        }

        if state.count >= rule.requests {
            let retry_after = (state.window_end().saturating_sub(now) as u32).max(1);
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

        state.count += 1;
        Ok(RateLimitResult::Allowed(RateLimitStatus {
            limit: rule.requests,
            remaining: rule.requests.saturating_sub(state.count),
            reset_at: Timestamp::from_unix_secs(state.window_end()),
            window_secs: state.window_secs,
        }))
    }

    async fn status(&self, key: RateLimitKey) -> Result<RateLimitStatus, RateLimitError> {
        let rule = self.throttle.rule_for(key.scope);
        let now = Self::now_secs();

        let windows = self.windows.read().await;
        let (count, window_start) = match windows.get(&key.to_redis_key()) {
            Some(state) if now < state.window_end() => (state.count, state.window_start),
            _ => (0, now),
        };

        Ok(RateLimitStatus {
            limit: rule.requests,
            remaining: rule.requests.saturating_sub(count),
            reset_at: Timestamp::from_unix_secs(window_start + u64::from(rule.window_secs)),
            window_secs: rule.window_secs,
        })
    }

    async fn reset(&self, key: RateLimitKey) -> Result<(), RateLimitError> {
        self.windows.write().await.remove(&key.to_redis_key());
        Ok(())
    }
}
