use std::env;
use std::time::Duration;

use dotenv::dotenv;
use thiserror::Error;
use tracing::{info, warn};

use crate::api_connection::ApiConnectionError;

pub const BACKEND_URL_ENV_VAR: &str = "SMARTCHEF_BACKEND_URL";
pub const IMAGE_SEARCH_URL_ENV_VAR: &str = "SMARTCHEF_IMAGE_SEARCH_URL";
pub const UNSPLASH_KEY_ENV_VAR: &str = "UNSPLASH_ACCESS_KEY";
pub const HTTP_TIMEOUT_ENV_VAR: &str = "SMARTCHEF_HTTP_TIMEOUT_SECS";

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_IMAGE_SEARCH_URL: &str = "https://api.unsplash.com";

/// Assigned when the image search yields nothing for a recipe.
pub const LOOKUP_FALLBACK_IMAGE: &str = "https://via.placeholder.com/600x400?text=No+Image";
/// Displayed when a resolved image fails to load.
pub const RENDER_FALLBACK_IMAGE: &str =
    "https://via.placeholder.com/600x400?text=Image+Not+Available";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Everything the collector and the image search need to reach their
/// collaborators. Built once and handed to each client explicitly.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: String,
    pub image_search_url: String,
    pub unsplash_access_key: Option<String>,
    pub http_timeout: Option<Duration>,
    pub lookup_fallback_image: String,
    pub render_fallback_image: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            image_search_url: DEFAULT_IMAGE_SEARCH_URL.to_string(),
            unsplash_access_key: None,
            http_timeout: None,
            lookup_fallback_image: LOOKUP_FALLBACK_IMAGE.to_string(),
            render_fallback_image: RENDER_FALLBACK_IMAGE.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = non_empty(lookup(BACKEND_URL_ENV_VAR)) {
            config.backend_url = url;
        } else {
            info!("{BACKEND_URL_ENV_VAR} not set, using default: {DEFAULT_BACKEND_URL}");
        }
        if let Some(url) = non_empty(lookup(IMAGE_SEARCH_URL_ENV_VAR)) {
            config.image_search_url = url;
        }

        config.unsplash_access_key = non_empty(lookup(UNSPLASH_KEY_ENV_VAR));
        if config.unsplash_access_key.is_none() {
            warn!("{UNSPLASH_KEY_ENV_VAR} not set, recipe images will use the placeholder");
        }

        if let Some(raw) = non_empty(lookup(HTTP_TIMEOUT_ENV_VAR)) {
            let secs = raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: HTTP_TIMEOUT_ENV_VAR,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    key: HTTP_TIMEOUT_ENV_VAR,
                    value: raw,
                    reason: "timeout must be at least one second".to_string(),
                });
            }
            config.http_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    pub fn with_image_search_url(mut self, url: impl Into<String>) -> Self {
        self.image_search_url = url.into();
        self
    }

    pub fn with_unsplash_access_key(mut self, key: impl Into<String>) -> Self {
        self.unsplash_access_key = Some(key.into());
        self
    }

    /// The shared request client. Clone it into every component that talks HTTP.
    pub fn http_client(&self) -> Result<reqwest::Client, ApiConnectionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.http_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
