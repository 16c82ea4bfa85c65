//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MIBU_API_BASE_URL` - Base URL of the Mibu backend (http/https)
//!
//! ## Optional
//! - `MIBU_DEEP_LINK_SCHEME` - Custom URL scheme for auth callbacks
//!   (default: mibu)
//! - `MIBU_OAUTH_TIMEOUT_SECS` - Ceiling on waiting for the OAuth
//!   popup/deep-link callback (default: 120)
//! - `MIBU_DEFAULT_LANGUAGE` - Initial UI language before a stored
//!   preference exists: zh-TW, en, ja, or ko (default: en)

use std::time::Duration;

use thiserror::Error;
use url::Url;

use mibu_core::Language;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Mibu client configuration.
#[derive(Debug, Clone)]
pub struct MibuConfig {
    /// Base URL of the Mibu backend API
    pub api_base_url: Url,
    /// Custom URL scheme the auth callback deep link arrives on
    pub deep_link_scheme: String,
    /// Wall-clock ceiling on the OAuth popup/deep-link exchange
    pub oauth_timeout: Duration,
    /// UI language used before any persisted preference exists
    pub default_language: Language,
}

impl MibuConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = parse_base_url("MIBU_API_BASE_URL", &get_required_env("MIBU_API_BASE_URL")?)?;
        let deep_link_scheme = get_env_or_default("MIBU_DEEP_LINK_SCHEME", "mibu");
        let timeout_secs = get_env_or_default("MIBU_OAUTH_TIMEOUT_SECS", "120")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("MIBU_OAUTH_TIMEOUT_SECS".to_string(), e.to_string())
            })?;
        let default_language = parse_language(
            "MIBU_DEFAULT_LANGUAGE",
            &get_env_or_default("MIBU_DEFAULT_LANGUAGE", "en"),
        )?;

        Ok(Self {
            api_base_url,
            deep_link_scheme,
            oauth_timeout: Duration::from_secs(timeout_secs),
            default_language,
        })
    }

    /// The redirect URI registered with the backend for deep-link callbacks.
    #[must_use]
    pub fn callback_uri(&self) -> String {
        format!("{}://auth/callback", self.deep_link_scheme)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse and validate an http(s) base URL.
fn parse_base_url(var_name: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("expected http or https URL, got scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Parse a language tag as persisted/configured (zh-TW, en, ja, ko).
fn parse_language(var_name: &str, value: &str) -> Result<Language, ConfigError> {
    match value {
        "zh-TW" => Ok(Language::ZhTw),
        "en" => Ok(Language::En),
        "ja" => Ok(Language::Ja),
        "ko" => Ok(Language::Ko),
        other => Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unknown language tag '{other}'"),
        )),
    }
}
