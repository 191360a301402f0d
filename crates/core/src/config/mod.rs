//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (COMICSLATE_*)
//! 2. TOML config file (if COMICSLATE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::markup::HeadingStyle;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (COMICSLATE_*)
/// 2. TOML config file (if COMICSLATE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the wiki. The RPC endpoint lives under it.
    ///
    /// Set via COMICSLATE_DOKU_BASE_URL environment variable.
    #[serde(default = "default_doku_base_url")]
    pub doku_base_url: String,

    /// Wiki account used for reading and writing the cache page.
    #[serde(default)]
    pub doku_user: Option<String>,

    #[serde(default)]
    pub doku_password: Option<String>,

    /// Page holding the persisted catalog.
    #[serde(default = "default_cache_page")]
    pub cache_page: String,

    /// Root directory of rendered artifacts.
    ///
    /// Set via COMICSLATE_RENDER_DIR environment variable.
    #[serde(default = "default_render_dir")]
    pub render_dir: PathBuf,

    /// JavaScript file computing the screenshot clip rectangle.
    ///
    /// Re-read on every render. When unset, the builtin script is used.
    #[serde(default)]
    pub clip_script: Option<PathBuf>,

    /// Maximum number of renders running at once. Unbounded when unset.
    #[serde(default)]
    pub max_concurrent_renders: Option<usize>,

    /// Timeout of a single render in milliseconds.
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,

    /// Period of the background catalog refresh in seconds.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Delay between login attempts in milliseconds.
    #[serde(default = "default_login_retry_ms")]
    pub login_retry_ms: u64,

    /// RPC request timeout in milliseconds.
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// User-Agent string for RPC requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Category heading convention of the menu pages.
    #[serde(default)]
    pub heading_style: HeadingStyle,

    /// Patterns of menu link targets that are never fetched.
    ///
    /// Set via COMICSLATE_BANNED_COMICS environment variable as an array,
    /// e.g. `COMICSLATE_BANNED_COMICS='["adult", "nsfw"]'`.
    #[serde(default)]
    pub banned_comics: Vec<String>,
}

fn default_doku_base_url() -> String {
    "http://localhost/".into()
}

fn default_cache_page() -> String {
    "comicslate:cache".into()
}

fn default_render_dir() -> PathBuf {
    PathBuf::from("./renders")
}

fn default_render_timeout_ms() -> u64 {
    180_000
}

fn default_refresh_interval_secs() -> u64 {
    600
}

fn default_login_retry_ms() -> u64 {
    10_000
}

fn default_rpc_timeout_ms() -> u64 {
    20_000
}

fn default_user_agent() -> String {
    "comicslate/0.1".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            doku_base_url: default_doku_base_url(),
            doku_user: None,
            doku_password: None,
            cache_page: default_cache_page(),
            render_dir: default_render_dir(),
            clip_script: None,
            max_concurrent_renders: None,
            render_timeout_ms: default_render_timeout_ms(),
            refresh_interval_secs: default_refresh_interval_secs(),
            login_retry_ms: default_login_retry_ms(),
            rpc_timeout_ms: default_rpc_timeout_ms(),
            user_agent: default_user_agent(),
            heading_style: HeadingStyle::default(),
            banned_comics: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn login_retry(&self) -> Duration {
        Duration::from_millis(self.login_retry_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// Parsed wiki base URL. Always ends with a slash so joins stay under it.
    pub fn base_url(&self) -> Result<url::Url, ConfigError> {
        let raw = if self.doku_base_url.ends_with('/') {
            self.doku_base_url.clone()
        } else {
            format!("{}/", self.doku_base_url)
        };
        url::Url::parse(&raw).map_err(|e| ConfigError::Invalid { field: "doku_base_url".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `COMICSLATE_`
    /// 2. TOML file from `COMICSLATE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("COMICSLATE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("COMICSLATE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Wiki credentials, required before the service can log in.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` naming the first absent field.
    pub fn require_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let user = self.doku_user.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "doku_user".into(),
            hint: "Set COMICSLATE_DOKU_USER environment variable".into(),
        })?;
        let password = self.doku_password.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "doku_password".into(),
            hint: "Set COMICSLATE_DOKU_PASSWORD environment variable".into(),
        })?;
        Ok((user, password))
    }
}
