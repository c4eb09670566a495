//! Connection settings for a single Solr core.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::errors::SearchIndexError;

/// Default request timeout for the Solr client.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1020);

/// HTTP basic credentials for the Solr server.
#[derive(Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Retry policy for transient submit failures.
///
/// A request is attempted `1 + max_retries` times. The wait before retry `n`
/// (starting at 1) is `backoff * n`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Delay to wait before the given retry attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Configuration for a Solr core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Base URL of the Solr server (e.g., "http://localhost:8983/solr").
    pub server: String,
    /// Name of the core (or collection) to write to.
    pub core: String,
    /// Optional basic credentials.
    pub auth: Option<BasicAuth>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry policy for submissions.
    pub retry: RetryPolicy,
}

impl CoreConfig {
    /// Create a new core configuration with default timeout and retry policy.
    ///
    /// # Arguments
    ///
    /// * `server` - The Solr server base URL
    /// * `core` - The core name
    pub fn new(server: impl Into<String>, core: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            core: core.into(),
            auth: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_auth(mut self, auth: Option<BasicAuth>) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The full URL of the core, validated.
    ///
    /// # Returns
    ///
    /// * `Ok(Url)` - The core URL with a trailing slash, ready for `join`
    /// * `Err(SearchIndexError)` - If the server URL cannot be parsed
    pub fn core_url(&self) -> Result<Url, SearchIndexError> {
        let core = self.core.trim_matches('/');
        if core.is_empty() {
            return Err(SearchIndexError::validation("Solr core name is empty"));
        }
        let raw = format!("{}/{}/", self.server.trim_end_matches('/'), core);
        Url::parse(&raw).map_err(|e| SearchIndexError::connection(format!("{}: {}", raw, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_url_joins_without_double_slash() {
        let config = CoreConfig::new("http://localhost:8983/solr/", "mmd");
        assert_eq!(
            config.core_url().unwrap().as_str(),
            "http://localhost:8983/solr/mmd/"
        );
    }

    #[test]
    fn test_core_url_rejects_garbage() {
        let config = CoreConfig::new("not a url", "mmd");
        assert!(matches!(
            config.core_url(),
            Err(SearchIndexError::ConnectionError(_))
        ));
    }

    #[test]
    fn test_core_url_rejects_empty_core() {
        let config = CoreConfig::new("http://localhost:8983/solr", "/");
        assert!(config.core_url().is_err());
    }

    #[test]
    fn test_retry_delay_grows_linearly() {
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn test_debug_hides_password() {
        let auth = BasicAuth::new("user", "secret");
        let printed = format!("{:?}", auth);
        assert!(printed.contains("user"));
        assert!(!printed.contains("secret"));
    }
}
