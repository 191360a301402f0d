//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `doku_base_url` is not an absolute URL
    /// - `cache_page` or `user_agent` is empty
    /// - `max_concurrent_renders` is 0
    /// - `render_timeout_ms` is below 1s or above 30 minutes
    /// - `refresh_interval_secs` is below 10s
    /// - `login_retry_ms` is 0
    /// - a `banned_comics` pattern does not compile
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;

        if self.cache_page.trim().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_page".into(), reason: "must not be empty".into() });
        }

        if self.max_concurrent_renders == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_renders".into(),
                reason: "must be greater than 0 (leave unset for no limit)".into(),
            });
        }

        if self.render_timeout_ms < 1_000 {
            return Err(ConfigError::Invalid { field: "render_timeout_ms".into(), reason: "must be at least 1s".into() });
        }
        if self.render_timeout_ms > 1_800_000 {
            return Err(ConfigError::Invalid {
                field: "render_timeout_ms".into(),
                reason: "must not exceed 30 minutes (1800000ms)".into(),
            });
        }

        if self.refresh_interval_secs < 10 {
            return Err(ConfigError::Invalid {
                field: "refresh_interval_secs".into(),
                reason: "must be at least 10 seconds".into(),
            });
        }

        if self.login_retry_ms == 0 {
            return Err(ConfigError::Invalid { field: "login_retry_ms".into(), reason: "must be greater than 0".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        for pattern in &self.banned_comics {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::Invalid { field: "banned_comics".into(), reason: format!("{pattern}: {e}") });
            }
        }

        if self.max_concurrent_renders.is_none() {
            tracing::warn!(
                render_timeout_ms = self.render_timeout_ms,
                "max_concurrent_renders is unset; a full validation pass may open one browser tab per comic"
            );
        }

        Ok(())
    }
}
