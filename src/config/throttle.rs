//! Admission throttle configuration

use serde::Deserialize;

use crate::ports::RateLimitScope;

use super::error::ValidationError;

/// Fixed-window threshold for one scope
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct ThrottleRule {
    pub requests: u32,
    pub window_secs: u32,
}

impl ThrottleRule {
    pub const fn new(requests: u32, window_secs: u32) -> Self {
        Self {
            requests,
            window_secs,
        }
    }
}

/// Per-scope thresholds
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ThrottleConfig {
    #[serde(default = "default_create")]
    pub create: ThrottleRule,

    #[serde(default = "default_message")]
    pub message: ThrottleRule,

    #[serde(default = "default_message_per_conversation")]
    pub message_per_conversation: ThrottleRule,

    #[serde(default = "default_detail")]
    pub detail: ThrottleRule,
}

impl ThrottleConfig {
    pub fn rule_for(&self, scope: RateLimitScope) -> ThrottleRule {
        match scope {
            RateLimitScope::Create => self.create,
            RateLimitScope::Message => self.message,
            RateLimitScope::MessagePerConversation => self.message_per_conversation,
            RateLimitScope::Detail => self.detail,
        }
    }

    /// Same rule for every scope. Handy in tests.
    pub fn uniform(rule: ThrottleRule) -> Self {
        Self {
            create: rule,
            message: rule,
            message_per_conversation: rule,
            detail: rule,
        }
    }

    pub fn with_rule(mut self, scope: RateLimitScope, rule: ThrottleRule) -> Self {
        match scope {
            RateLimitScope::Create => self.create = rule,
            RateLimitScope::Message => self.message = rule,
            RateLimitScope::MessagePerConversation => self.message_per_conversation = rule,
            RateLimitScope::Detail => self.detail = rule,
        }
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for scope in RateLimitScope::all() {
            let rule = self.rule_for(scope);
            if rule.requests == 0 || rule.window_secs == 0 {
                return Err(ValidationError::InvalidThrottle(scope.as_str()));
            }
        }
        Ok(())
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            create: default_create(),
            message: default_message(),
            message_per_conversation: default_message_per_conversation(),
            detail: default_detail(),
        }
    }
}

const HOUR: u32 = 3600;

fn default_create() -> ThrottleRule {
    ThrottleRule::new(10, HOUR)
}

fn default_message() -> ThrottleRule {
    ThrottleRule::new(60, HOUR)
}

fn default_message_per_conversation() -> ThrottleRule {
    ThrottleRule::new(30, HOUR)
}

fn default_detail() -> ThrottleRule {
    ThrottleRule::new(120, HOUR)
}
