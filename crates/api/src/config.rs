use std::time::Duration;

use crate::error::ApiError;

/// Fallback for [`ApiConfig::access_token`].
pub const ACCESS_TOKEN_ENV: &str = "P1AUTHZ_ACCESS_TOKEN";
/// Fallback for [`ApiConfig::base_url`].
pub const API_URL_ENV: &str = "P1AUTHZ_API_URL";
pub const DEFAULT_BASE_URL: &str = "https://api.pingone.com/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`HttpClient`](crate::HttpClient).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    pub access_token: String,
    /// Management API root; defaults to `base_url`.
    pub management_base_url: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: access_token.into(),
            management_base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Fill whatever the caller left out from the environment.
    ///
    /// The token is mandatory; the base URL falls back to
    /// [`DEFAULT_BASE_URL`].
    pub fn resolve(base_url: Option<&str>, access_token: Option<&str>) -> Result<Self, ApiError> {
        let base_url = base_url
            .map(|s| s.to_string())
            .or_else(|| std::env::var(API_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let access_token = access_token
            .map(|s| s.to_string())
            .or_else(|| std::env::var(ACCESS_TOKEN_ENV).ok())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ApiError::NotConfigured(format!(
                    "no access token: pass one explicitly or set {}",
                    ACCESS_TOKEN_ENV
                ))
            })?;
        Ok(Self::new(base_url.trim_end_matches('/'), access_token))
    }

    pub fn management_url(&self) -> &str {
        self.management_base_url.as_deref().unwrap_or(&self.base_url)
    }
}
