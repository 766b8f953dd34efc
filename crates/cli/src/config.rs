//! `p1authz.toml`: connection and timing settings for the lifecycle
//! commands.
//!
//! ```toml
//! [api]
//! base_url = "https://api.pingone.eu/v1"
//! access_token = "..."
//! timeout_secs = 30
//!
//! [reconcile]
//! create_read_timeout_secs = 600
//!
//! [reconcile.delete]
//! timeout_secs = 1200
//! continuous_target = 2
//! ```
//!
//! Command-line flags override the file; the environment fills whatever is
//! still missing.

use std::path::{Path, PathBuf};
use std::time::Duration;

use p1authz_api::ApiConfig;
use p1authz_reconcile::ReconcileConfig;
use serde::Deserialize;

/// Read from the working directory when `--config` is not given.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "p1authz.toml";

/// The global flags that feed configuration.
#[derive(Debug, Default)]
pub(crate) struct Settings {
    pub file: Option<PathBuf>,
    pub api_url: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub api: ApiSection,
    pub reconcile: ReconcileSection,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ApiSection {
    pub base_url: Option<String>,
    pub access_token: Option<String>,
    pub management_base_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ReconcileSection {
    pub create_read_timeout_secs: Option<u64>,
    pub retry_initial_backoff_ms: Option<u64>,
    pub retry_max_backoff_ms: Option<u64>,
    pub delete: DeleteSection,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct DeleteSection {
    pub timeout_secs: Option<u64>,
    pub delay_ms: Option<u64>,
    pub min_interval_ms: Option<u64>,
    pub max_interval_ms: Option<u64>,
    pub continuous_target: Option<u32>,
}

impl FileConfig {
    /// Load `explicit`, or [`DEFAULT_CONFIG_FILE`] if it exists. An
    /// explicit path that cannot be read is an error; a missing default
    /// file is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self, String> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let p = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !p.is_file() {
                    return Ok(Self::default());
                }
                p
            }
        };
        let text = std::fs::read_to_string(&path)
            .map_err(|e| format!("error reading config '{}': {}", path.display(), e))?;
        Self::parse(&text).map_err(|e| format!("error parsing config '{}': {}", path.display(), e))
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Client settings: flags first, then this file, then the environment.
    pub fn api_config(&self, settings: &Settings) -> Result<ApiConfig, String> {
        let base_url = settings.api_url.as_deref().or(self.api.base_url.as_deref());
        let token = settings.token.as_deref().or(self.api.access_token.as_deref());
        let mut config = ApiConfig::resolve(base_url, token).map_err(|e| e.to_string())?;
        if let Some(url) = &self.api.management_base_url {
            config.management_base_url = Some(url.trim_end_matches('/').to_string());
        }
        if let Some(secs) = self.api.timeout_secs {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Reconciler timings, defaulting whatever the file leaves out.
    pub fn reconcile_config(&self) -> ReconcileConfig {
        let mut config = ReconcileConfig::default();
        let r = &self.reconcile;
        if let Some(secs) = r.create_read_timeout_secs {
            config.create_read_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = r.retry_initial_backoff_ms {
            config.retry_initial_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = r.retry_max_backoff_ms {
            config.retry_max_backoff = Duration::from_millis(ms);
        }

        let d = &r.delete;
        if let Some(secs) = d.timeout_secs {
            config.delete.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = d.delay_ms {
            config.delete.delay = Duration::from_millis(ms);
        }
        if let Some(ms) = d.min_interval_ms {
            config.delete.min_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = d.max_interval_ms {
            config.delete.max_interval = Duration::from_millis(ms);
        }
        if let Some(n) = d.continuous_target {
            config.delete.continuous_target = n;
        }
        config
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
