//! Client configuration.
//!
//! Settings come from built-in defaults, then an optional `reports.toml`, then
//! environment variables:
//!
//! - `REPORTS_API_URL` - Backend base URL
//! - `REPORTS_TIMEOUT_SECS` - Per-request timeout in seconds
//! - `REPORTS_POLL_INTERVAL_MS` - Job status poll interval in milliseconds

use std::fs;
use std::path::Path;
use std::time::Duration;

use reports_cache::RetryPolicy;
use reports_core::{ReportsError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default config file, looked up in the working directory.
pub const CONFIG_FILE: &str = "reports.toml";

/// Environment variable overriding [`ClientConfig::base_url`].
pub const ENV_API_URL: &str = "REPORTS_API_URL";
/// Environment variable overriding [`ClientConfig::request_timeout_secs`].
pub const ENV_TIMEOUT_SECS: &str = "REPORTS_TIMEOUT_SECS";
/// Environment variable overriding [`ClientConfig::poll_interval_ms`].
pub const ENV_POLL_INTERVAL_MS: &str = "REPORTS_POLL_INTERVAL_MS";

/// Settings for [`ReportsClient`](crate::ReportsClient).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL, e.g. `http://localhost:8000/api`.
    pub base_url: String,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
    /// Delay between the end of one job status read and the next, in
    /// milliseconds.
    pub poll_interval_ms: u64,
    /// Retries of a transiently failing job status read.
    pub job_status_retries: u32,
    /// Retries of a transiently failing dashboard read.
    pub dashboard_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Longest delay between retries, in seconds.
    pub retry_max_delay_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".into(),
            request_timeout_secs: 30,
            poll_interval_ms: 2000,
            job_status_retries: 3,
            dashboard_retries: 0,
            retry_base_delay_ms: 1000,
            retry_max_delay_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Loads `reports.toml` from the working directory if present, then
    /// applies environment overrides.
    pub fn load() -> Result<Self> {
        let path = Path::new(CONFIG_FILE);
        let config = if path.exists() {
            Self::from_file(path)?
        } else {
            debug!("No {CONFIG_FILE}, using defaults");
            Self::default()
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Reads settings from a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            ReportsError::InvalidParameter(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&raw)
            .map_err(|e| ReportsError::InvalidParameter(format!("{}: {e}", path.display())))
    }

    /// Parses settings from a TOML document.
    pub fn from_toml(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Applies overrides from `lookup`, normally the process environment.
    /// Values that do not parse are ignored with a warning.
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_API_URL).filter(|url| !url.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(secs) = parse_override(&lookup, ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = secs;
        }
        if let Some(ms) = parse_override(&lookup, ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = ms;
        }
        self
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Job status poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Retry policy for job status reads.
    #[must_use]
    pub const fn job_status_retry(&self) -> RetryPolicy {
        self.retry(self.job_status_retries)
    }

    /// Retry policy for dashboard reads.
    #[must_use]
    pub const fn dashboard_retry(&self) -> RetryPolicy {
        self.retry(self.dashboard_retries)
    }

    const fn retry(&self, max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries).with_backoff(
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_secs(self.retry_max_delay_secs),
        )
    }
}

fn parse_override(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "Ignoring invalid override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000/api");
        assert_eq!(config.poll_interval(), Duration::from_millis(2000));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.job_status_retry().max_retries, 3);
        assert_eq!(config.dashboard_retry(), RetryPolicy::none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml(
            r#"
            base_url = "https://reports.example.org/api"
            poll_interval_ms = 500
            "#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://reports.example.org/api");
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.job_status_retries, 3);

        assert!(ClientConfig::from_toml("poll_interval_ms = \"soon\"").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, " http://10.0.0.5:8000/api "),
            (ENV_TIMEOUT_SECS, "5"),
            (ENV_POLL_INTERVAL_MS, "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::default()
            .with_env_overrides(|key| env.get(key).map(|value| (*value).to_string()));
        assert_eq!(config.base_url, "http://10.0.0.5:8000/api");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.poll_interval_ms, 2000);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ClientConfig::from_file(Path::new("/nonexistent/reports.toml")).unwrap_err();
        assert!(matches!(err, ReportsError::InvalidParameter(_)));
    }
}
