//! Admission control ahead of any interview work.

use std::sync::Arc;

use thiserror::Error;

use crate::ports::{RateLimitKey, RateLimitResult, RateLimitScope, RateLimiter};

/// The caller exceeded a scope's threshold.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("too many requests for {scope}; retry after {retry_after_secs} seconds")]
pub struct AdmissionRejected {
    pub scope: RateLimitScope,
    pub retry_after_secs: u32,
}

impl AdmissionRejected {
    pub fn code(&self) -> &'static str {
        "admission_rejected"
    }
}

/// Fixed-window admission keyed by `(scope, identity)`.
///
/// A limiter backend failure admits the request.
#[derive(Clone)]
pub struct AdmissionGuard {
    limiter: Arc<dyn RateLimiter>,
}

impl AdmissionGuard {
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self { limiter }
    }

    pub async fn admit(&self, scope: RateLimitScope, identity: &str) -> bool {
        self.check(scope, identity).await.is_ok()
    }

    pub async fn check(&self, scope: RateLimitScope, identity: &str) -> Result<(), AdmissionRejected> {
        match self.limiter.check(RateLimitKey::new(scope, identity)).await {
            Ok(RateLimitResult::Allowed(_)) => Ok(()),
            Ok(RateLimitResult::Denied(denied)) => {
                tracing::info!(
                    scope = %scope,
                    identity,
                    limit = denied.limit,
                    retry_after_secs = denied.retry_after_secs,
                    "Admission rejected"
                );
                Err(AdmissionRejected {
                    scope,
                    retry_after_secs: denied.retry_after_secs,
                })
            }
            Err(err) => {
                tracing::warn!(scope = %scope, error = %err, "Rate limiter unavailable, admitting request");
                Ok(())
            }
        }
    }
}
