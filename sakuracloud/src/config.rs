//! Provider configuration
//!
//! Explicit settings win; anything left unset is read from the
//! `SAKURACLOUD_*` environment variables and then falls back to defaults.

use std::env;
use thiserror::Error;

use crate::api::{ApiError, Client, RetryConfig, DEFAULT_API_ROOT_URL};

pub const DEFAULT_ZONE: &str = "is1a";
pub const DEFAULT_RETRY_MAX: u32 = 3;
pub const DEFAULT_API_REQUEST_TIMEOUT: u64 = 300;

pub const ENV_ACCESS_TOKEN: &str = "SAKURACLOUD_ACCESS_TOKEN";
pub const ENV_ACCESS_TOKEN_SECRET: &str = "SAKURACLOUD_ACCESS_TOKEN_SECRET";
pub const ENV_ZONE: &str = "SAKURACLOUD_ZONE";
pub const ENV_API_ROOT_URL: &str = "SAKURACLOUD_API_ROOT_URL";
pub const ENV_RETRY_MAX: &str = "SAKURACLOUD_RETRY_MAX";
pub const ENV_API_REQUEST_TIMEOUT: &str = "SAKURACLOUD_API_REQUEST_TIMEOUT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("access token is required (set it explicitly or via {ENV_ACCESS_TOKEN})")]
    MissingAccessToken,

    #[error("access token secret is required (set it explicitly or via {ENV_ACCESS_TOKEN_SECRET})")]
    MissingAccessTokenSecret,

    #[error("invalid API root URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid value {value:?} for {name}: expected a non-negative integer")]
    InvalidNumber { name: &'static str, value: String },
}

/// Values given explicitly, e.g. on the command line
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
    pub zone: Option<String>,
    pub api_root_url: Option<String>,
    pub retry_max: Option<u32>,
    pub api_request_timeout: Option<u64>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub access_token: String,
    pub access_token_secret: String,
    pub zone: String,
    pub api_root_url: String,
    pub retry_max: u32,
    /// Seconds
    pub api_request_timeout: u64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &"<redacted>")
            .field("zone", &self.zone)
            .field("api_root_url", &self.api_root_url)
            .field("retry_max", &self.retry_max)
            .field("api_request_timeout", &self.api_request_timeout)
            .finish()
    }
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(ProviderSettings::default())
    }

    pub fn resolve(settings: ProviderSettings) -> Result<Self, ConfigError> {
        let access_token = settings
            .access_token
            .or_else(|| env_string(ENV_ACCESS_TOKEN))
            .ok_or(ConfigError::MissingAccessToken)?;

        let access_token_secret = settings
            .access_token_secret
            .or_else(|| env_string(ENV_ACCESS_TOKEN_SECRET))
            .ok_or(ConfigError::MissingAccessTokenSecret)?;

        let zone = settings
            .zone
            .or_else(|| env_string(ENV_ZONE))
            .unwrap_or_else(|| DEFAULT_ZONE.to_string());

        let api_root_url = settings
            .api_root_url
            .or_else(|| env_string(ENV_API_ROOT_URL))
            .unwrap_or_else(|| DEFAULT_API_ROOT_URL.to_string());
        url::Url::parse(&api_root_url).map_err(|source| ConfigError::InvalidUrl {
            url: api_root_url.clone(),
            source,
        })?;

        let retry_max = match settings.retry_max {
            Some(value) => value,
            None => env_number(ENV_RETRY_MAX)?.unwrap_or(DEFAULT_RETRY_MAX),
        };

        let api_request_timeout = match settings.api_request_timeout {
            Some(value) => value,
            None => env_number(ENV_API_REQUEST_TIMEOUT)?.unwrap_or(DEFAULT_API_REQUEST_TIMEOUT),
        };

        Ok(Self {
            access_token,
            access_token_secret,
            zone,
            api_root_url,
            retry_max,
            api_request_timeout,
        })
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry_max,
            timeout_seconds: self.api_request_timeout,
            ..Default::default()
        }
    }

    pub fn client(&self) -> Result<Client, ApiError> {
        Client::with_config(
            &self.api_root_url,
            &self.access_token,
            &self.access_token_secret,
            self.retry_config(),
        )
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn env_number<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env_string(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        None => Ok(None),
    }
}
