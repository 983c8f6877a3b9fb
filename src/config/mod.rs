//! Application configuration module
//!
//! Configuration is read from environment variables (and an optional `.env`
//! file) with the `APTITUDE_INTERVIEW` prefix. Nested values are separated by
//! a double underscore.
//!
//! # Example
//!
//! ```no_run
//! use aptitude_interview::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod ai;
mod database;
mod error;
mod interview;
mod redis;
mod server;
mod throttle;

pub use ai::{AiConfig, AiProvider};
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use interview::InterviewConfig;
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};
pub use throttle::{ThrottleConfig, ThrottleRule};

use serde::Deserialize;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "APTITUDE_INTERVIEW";

/// Root application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL; in-memory storage when absent
    pub database: Option<DatabaseConfig>,

    /// Shared admission counters; in-process counters when absent
    pub redis: Option<RedisConfig>,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub interview: InterviewConfig,

    #[serde(default)]
    pub throttle: ThrottleConfig,
}

impl AppConfig {
    /// Load configuration from the environment
    ///
    /// - `APTITUDE_INTERVIEW__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `APTITUDE_INTERVIEW__AI__PROVIDER=gemini` -> `ai.provider = gemini`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix(ENV_PREFIX)
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(database) = &self.database {
            database.validate()?;
        }
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }
        self.ai.validate()?;
        self.interview.validate()?;
        self.throttle.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // env vars are process-global
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "APTITUDE_INTERVIEW__AI__API_KEY",
        "APTITUDE_INTERVIEW__AI__PROVIDER",
        "APTITUDE_INTERVIEW__INTERVIEW__MAX_QUESTIONS",
        "APTITUDE_INTERVIEW__THROTTLE__MESSAGE__REQUESTS",
        "APTITUDE_INTERVIEW__THROTTLE__MESSAGE__WINDOW_SECS",
        "APTITUDE_INTERVIEW__DATABASE__URL",
        "APTITUDE_INTERVIEW__SERVER__PORT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn load_with(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        clear_env();
        for (key, value) in vars {
            env::set_var(key, value);
        }
        let result = AppConfig::load();
        clear_env();
        result
    }

    #[test]
    fn test_minimal_environment_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[("APTITUDE_INTERVIEW__AI__API_KEY", "sk-test")]).unwrap();

        assert!(config.database.is_none());
        assert!(config.redis.is_none());
        assert_eq!(config.ai.provider, AiProvider::OpenAI);
        assert_eq!(config.interview.max_questions, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("APTITUDE_INTERVIEW__AI__API_KEY", "key"),
            ("APTITUDE_INTERVIEW__AI__PROVIDER", "gemini"),
            ("APTITUDE_INTERVIEW__INTERVIEW__MAX_QUESTIONS", "3"),
            ("APTITUDE_INTERVIEW__THROTTLE__MESSAGE__REQUESTS", "2"),
            ("APTITUDE_INTERVIEW__THROTTLE__MESSAGE__WINDOW_SECS", "60"),
            ("APTITUDE_INTERVIEW__SERVER__PORT", "3000"),
        ])
        .unwrap();

        assert_eq!(config.ai.provider, AiProvider::Gemini);
        assert_eq!(config.interview.max_questions, 3);
        assert_eq!(config.throttle.message, ThrottleRule::new(2, 60));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_database_section_is_validated_when_present() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[
            ("APTITUDE_INTERVIEW__AI__API_KEY", "key"),
            ("APTITUDE_INTERVIEW__DATABASE__URL", "mysql://nope"),
        ])
        .unwrap();

        assert_eq!(config.validate(), Err(ValidationError::InvalidDatabaseUrl));
    }

    #[test]
    fn test_missing_api_key_fails_validation() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let config = load_with(&[]).unwrap();

        assert!(config.validate().is_err());
    }
}
