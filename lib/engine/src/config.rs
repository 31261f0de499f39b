//! Engine connection settings.
//!
//! Loaded via the `config` crate from `ENGINE_*` environment variables, e.g.
//! `ENGINE_BASE_URL`, `ENGINE_API_KEY`, `ENGINE_MAX_RETRIES`. The base URL
//! and API key have no default; a process without them must not start.

use crate::backoff::BackoffPolicy;
use mantra_workflow::TransformOptions;
use mantra_workflow::transform::{DEFAULT_OAUTH_TOKEN_URL, DEFAULT_TOKEN_BROKER_URL};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Prefix of the environment variables read by [`EngineConfig::from_env`].
pub const ENV_PREFIX: &str = "ENGINE";

/// Connection, retry and token-endpoint settings for the engine.
#[derive(Clone, Deserialize)]
pub struct EngineConfig {
    /// REST API base, e.g. `http://localhost:5678/api/v1`.
    pub base_url: String,

    /// Sent as the `X-N8N-API-KEY` header.
    pub api_key: String,

    /// Base for webhook calls. Defaults to `<origin of base_url>/webhook`.
    #[serde(default)]
    pub webhook_base_url: Option<String>,

    /// Timeout applied to every request, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts per call, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between attempts, in milliseconds; doubled per attempt.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Token endpoint baked into mail token nodes.
    #[serde(default = "default_oauth_token_url")]
    pub oauth_token_url: String,

    /// Token broker baked into calendar, drive and sheets token nodes.
    #[serde(default = "default_token_broker_url")]
    pub token_broker_url: String,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_oauth_token_url() -> String {
    DEFAULT_OAUTH_TOKEN_URL.to_string()
}

fn default_token_broker_url() -> String {
    DEFAULT_TOKEN_BROKER_URL.to_string()
}

impl EngineConfig {
    /// Creates a configuration with default timeouts and retries.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            webhook_base_url: None,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            oauth_token_url: default_oauth_token_url(),
            token_broker_url: default_token_broker_url(),
        }
    }

    /// Loads configuration from `ENGINE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL or API key is missing or empty, if a
    /// value cannot be parsed, or if `max_retries` is zero.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
    }

    /// Loads configuration from any `config` source.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let loaded: Self = config::Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Checks values serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` describing the first invalid value.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "engine base_url must not be empty".to_string(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "engine api_key must not be empty".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(config::ConfigError::Message(
                "engine max_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The API base without a trailing slash.
    #[must_use]
    pub fn api_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }

    #[must_use]
    pub fn transform_options(&self) -> TransformOptions {
        TransformOptions {
            oauth_token_url: self.oauth_token_url.clone(),
            token_broker_url: self.token_broker_url.clone(),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("webhook_base_url", &self.webhook_base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("oauth_token_url", &self.oauth_token_url)
            .field("token_broker_url", &self.token_broker_url)
            .finish()
    }
}
