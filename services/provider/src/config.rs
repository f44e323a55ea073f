//! Configuration for the provider.

use std::time::Duration;

use anyhow::{Context, Result};

use gandi_reconcile::DEFAULT_POLL_INTERVAL;

/// Default public API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.gandi.net";

/// How the provider authenticates against the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Personal access token (`Authorization: Bearer ...`).
    PersonalAccessToken(String),

    /// Legacy API key (`Authorization: Apikey ...`).
    ApiKey(String),
}

impl Credentials {
    /// Value of the `Authorization` header.
    pub fn authorization(&self) -> String {
        match self {
            Self::PersonalAccessToken(token) => format!("Bearer {token}"),
            Self::ApiKey(key) => format!("Apikey {key}"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Provider configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// API base URL (without the `/v5` prefix).
    pub api_url: String,

    /// Credentials. A personal access token wins over an API key.
    pub credentials: Credentials,

    /// Organization to act for, when the credentials span several.
    pub sharing_id: Option<String>,

    /// Ask the API to validate writes without applying them.
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Wait between convergence checks.
    pub poll_interval: Duration,

    /// Overrides every per-kind operation timeout when set.
    pub timeout: Option<Duration>,

    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl Config {
    /// Create a configuration with defaults for everything but credentials.
    pub fn new(credentials: Credentials) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            credentials,
            sharing_id: None,
            dry_run: false,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let credentials = match (var("GANDI_PERSONAL_ACCESS_TOKEN"), var("GANDI_KEY")) {
            (Some(token), _) => Credentials::PersonalAccessToken(token),
            (None, Some(key)) => Credentials::ApiKey(key),
            (None, None) => anyhow::bail!(
                "no credentials: set GANDI_PERSONAL_ACCESS_TOKEN (or the legacy GANDI_KEY)"
            ),
        };

        let mut config = Self::new(credentials);

        if let Some(url) = var("GANDI_URL") {
            config.api_url = url.trim_end_matches('/').to_string();
        }

        config.sharing_id = var("GANDI_SHARING_ID");

        config.dry_run = var("GANDI_DRY_RUN")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if let Some(level) = var("GANDI_LOG_LEVEL") {
            config.log_level = level;
        }

        config.log_format = match var("GANDI_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            Some("text") | None => LogFormat::Text,
            Some(other) => anyhow::bail!("GANDI_LOG_FORMAT must be 'text' or 'json', got '{other}'"),
        };

        if let Some(secs) = var("GANDI_POLL_INTERVAL_SECS") {
            let secs: u64 = secs
                .parse()
                .context("GANDI_POLL_INTERVAL_SECS must be a number of seconds")?;
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = var("GANDI_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .context("GANDI_TIMEOUT_SECS must be a number of seconds")?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_requires_credentials() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("no credentials"));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[("GANDI_KEY", "k")])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.credentials, Credentials::ApiKey("k".to_string()));
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.timeout, None);
        assert!(!config.dry_run);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_token_wins_over_key() {
        let config = Config::from_lookup(lookup(&[
            ("GANDI_KEY", "k"),
            ("GANDI_PERSONAL_ACCESS_TOKEN", "pat"),
        ]))
        .unwrap();
        assert_eq!(config.credentials.authorization(), "Bearer pat");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("GANDI_KEY", "k"),
            ("GANDI_URL", "https://api.sandbox.gandi.net/"),
            ("GANDI_SHARING_ID", "org-1"),
            ("GANDI_DRY_RUN", "true"),
            ("GANDI_LOG_FORMAT", "json"),
            ("GANDI_POLL_INTERVAL_SECS", "1"),
            ("GANDI_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://api.sandbox.gandi.net");
        assert_eq!(config.sharing_id.as_deref(), Some("org-1"));
        assert!(config.dry_run);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_rejects_bad_numbers() {
        let err = Config::from_lookup(lookup(&[
            ("GANDI_KEY", "k"),
            ("GANDI_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("GANDI_TIMEOUT_SECS"));
    }
}
