//! Configuration management for the Raven SDK
//!
//! Handles loading and validating environment variables with fail-soft behavior.
//! If the DSN is missing or invalid, the SDK disables itself gracefully
//! without affecting the host application.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::dsn::Dsn;
use crate::error::RavenError;

/// Default request timeout for event delivery
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the Raven SDK
///
/// Loaded from environment variables:
/// - `RAVEN_DSN`: Sentry DSN (required)
/// - `RAVEN_COMPRESSION`: gzip event bodies ("true"/"1"/"yes", default on)
/// - `RAVEN_TIMEOUT_SECS`: delivery timeout in seconds (default 5)
/// - `RAVEN_ENVIRONMENT`, `RAVEN_RELEASE`, `RAVEN_SERVER_NAME`: packet defaults
/// - `RAVEN_DEBUG`: Optional flag to log outgoing payloads at debug level
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether the SDK is active (has a valid DSN)
    pub active: bool,

    /// Parsed DSN
    pub dsn: Option<Dsn>,

    /// Gzip event bodies before sending
    pub compression: bool,

    /// Timeout for a single delivery attempt
    pub timeout: Duration,

    pub environment: Option<String>,
    pub release: Option<String>,
    pub server_name: Option<String>,

    /// Logger name stamped on packets that don't set one
    pub logger: String,

    /// Tags merged into every packet
    pub tags: BTreeMap<String, String>,

    /// Whether debug logging is enabled (from env RAVEN_DEBUG)
    pub debug: bool,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// A missing or unparsable `RAVEN_DSN` disables the SDK with a warning.
    /// The SDK never panics or crashes the application due to missing config.
    pub fn from_env() -> Self {
        let mut config = Self::new(std::env::var("RAVEN_DSN").ok());

        if let Ok(val) = std::env::var("RAVEN_COMPRESSION") {
            config.compression = is_truthy(&val);
        }

        if let Some(secs) = std::env::var("RAVEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }

        config.environment = std::env::var("RAVEN_ENVIRONMENT").ok();
        config.release = std::env::var("RAVEN_RELEASE").ok();
        config.server_name = std::env::var("RAVEN_SERVER_NAME").ok();
        config.debug = std::env::var("RAVEN_DEBUG")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);

        if config.active {
            tracing::debug!(
                compression = config.compression,
                timeout_secs = config.timeout.as_secs(),
                "Raven SDK initialized"
            );
        }

        config
    }

    /// Create configuration with an explicit DSN (useful for testing)
    pub fn new(dsn: Option<String>) -> Self {
        let dsn = match dsn.as_deref().map(Dsn::parse) {
            Some(Ok(dsn)) => Some(dsn),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Raven SDK DISABLED: RAVEN_DSN is invalid");
                None
            }
            None => {
                tracing::warn!("Raven SDK DISABLED: RAVEN_DSN is missing");
                None
            }
        };

        Self {
            active: dsn.is_some(),
            dsn,
            compression: true,
            timeout: DEFAULT_TIMEOUT,
            environment: None,
            release: None,
            server_name: None,
            logger: "root".to_string(),
            tags: BTreeMap::new(),
            debug: false,
        }
    }

    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Get the DSN (returns error if missing)
    pub fn get_dsn(&self) -> Result<&Dsn, RavenError> {
        self.dsn.as_ref().ok_or(RavenError::MissingConfig)
    }

    /// Wrap config in Arc for thread-safe sharing
    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn is_truthy(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_with_valid_dsn() {
        let config = Config::new(Some("https://pk:sk@sentry.example.com/1".to_string()));

        assert!(config.active);
        assert!(config.compression);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.get_dsn().unwrap().public_key(), "pk");
    }

    #[test]
    fn test_config_missing_dsn() {
        let config = Config::new(None);

        assert!(!config.active);
        assert!(matches!(config.get_dsn(), Err(RavenError::MissingConfig)));
    }

    #[test]
    fn test_config_invalid_dsn_disables() {
        let config = Config::new(Some("not a dsn".to_string()));
        assert!(!config.active);
        assert!(config.get_dsn().is_err());
    }

    #[test]
    fn test_config_builders() {
        let config = Config::new(Some("https://pk@sentry.example.com/1".to_string()))
            .with_compression(false)
            .with_timeout(Duration::from_millis(250))
            .with_environment("staging")
            .with_release("1.2.3")
            .with_tag("region", "eu");

        assert!(!config.compression);
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.environment.as_deref(), Some("staging"));
        assert_eq!(config.release.as_deref(), Some("1.2.3"));
        assert_eq!(config.tags.get("region").map(String::as_str), Some("eu"));
    }

    #[test]
    fn test_config_into_arc() {
        let arc_config = Config::new(Some("https://pk@sentry.example.com/1".to_string())).into_arc();
        assert!(arc_config.active);
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy("true"));
        assert!(is_truthy(" YES "));
        assert!(is_truthy("1"));
        assert!(!is_truthy("off"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn test_config_default_from_env() {
        let config = Config::default();
        let _ = config.active;
    }
}
