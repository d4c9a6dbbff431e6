//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use study_assistant_core::{default_models, RetryPolicy};
use tracing::Level;

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub cors_origin: String,
    pub gemini: GeminiConfig,
}

/// Everything the Gemini adapter and the fallback chain need.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub models: Vec<String>,
    pub retry: RetryPolicy,
    pub timeout: Option<Duration>,
}

impl GeminiConfig {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            models: default_models(),
            retry: RetryPolicy::default(),
            timeout: None,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());

        Ok(Self {
            bind_address,
            log_level,
            cors_origin,
            gemini: GeminiConfig::from_env()?,
        })
    }
}

impl GeminiConfig {
    /// Loads the Gemini settings alone. The diagnostic binaries only need these.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let api_base = std::env::var("GEMINI_API_BASE")
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_GEMINI_API_BASE.to_string());

        let models = match std::env::var("GEMINI_MODELS") {
            Ok(list) => parse_model_list(&list)?,
            Err(_) => default_models(),
        };

        let max_retries = parse_var("GEMINI_MAX_RETRIES")?;
        let initial_backoff_ms = parse_var("GEMINI_INITIAL_BACKOFF_MS")?;
        let defaults = RetryPolicy::default();
        let retry = RetryPolicy::new(
            max_retries.unwrap_or(defaults.max_retries),
            initial_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_delay),
        );

        let timeout = parse_var::<u64>("GEMINI_TIMEOUT_SECS")?.map(Duration::from_secs);

        Ok(Self {
            api_key,
            api_base,
            models,
            retry,
            timeout,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(None),
    }
}

/// Parses a comma-separated candidate list, keeping its order.
pub fn parse_model_list(raw: &str) -> Result<Vec<String>, ConfigError> {
    let models: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| m.strip_prefix("models/").unwrap_or(m).to_string())
        .collect();

    if models.is_empty() {
        return Err(ConfigError::InvalidValue(
            "GEMINI_MODELS".to_string(),
            "at least one model id is required".to_string(),
        ));
    }
    Ok(models)
}
