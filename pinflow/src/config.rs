//! Driver configuration.

use crate::conversation::ConversationLevel;
use crate::errors::PinflowError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for a driver client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Connection pool settings.
    #[serde(default)]
    pub pool: PoolConfig,
    /// Conversation settings.
    #[serde(default)]
    pub conversation: ConversationConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Synchronous facade settings.
    #[serde(default)]
    pub blocking: BlockingConfig,
}

impl DriverConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from a JSON document and validates it.
    pub fn from_json(json: &str) -> Result<Self, PinflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file and validates it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PinflowError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Sets the pool configuration.
    #[must_use]
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Sets the conversation configuration.
    #[must_use]
    pub fn with_conversation(mut self, conversation: ConversationConfig) -> Self {
        self.conversation = conversation;
        self
    }

    /// Sets the logging configuration.
    #[must_use]
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Sets the blocking facade configuration.
    #[must_use]
    pub const fn with_blocking(mut self, blocking: BlockingConfig) -> Self {
        self.blocking = blocking;
        self
    }

    /// Checks the configuration for values the driver cannot run with.
    pub fn validate(&self) -> Result<(), PinflowError> {
        if self.pool.endpoints.is_empty() {
            return Err(PinflowError::Config("pool.endpoints must not be empty".into()));
        }
        if self.pool.connections_per_endpoint == 0 {
            return Err(PinflowError::Config(
                "pool.connections_per_endpoint must be at least 1".into(),
            ));
        }
        let timeout = self.conversation.lease_timeout_seconds;
        if !timeout.is_finite() || timeout < 0.0 {
            return Err(PinflowError::Config(format!(
                "conversation.lease_timeout_seconds must be a non-negative number, got {timeout}"
            )));
        }
        if self.blocking.worker_threads == 0 {
            return Err(PinflowError::Config(
                "blocking.worker_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for the connection pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Server endpoints, e.g. `"db1:8529"`.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,
    /// Connections opened per endpoint.
    #[serde(default = "default_connections_per_endpoint")]
    pub connections_per_endpoint: usize,
}

fn default_endpoints() -> Vec<String> {
    vec!["127.0.0.1:8529".to_string()]
}

const fn default_connections_per_endpoint() -> usize {
    4
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            endpoints: default_endpoints(),
            connections_per_endpoint: default_connections_per_endpoint(),
        }
    }
}

impl PoolConfig {
    /// Creates a pool configuration for the given endpoints.
    #[must_use]
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            connections_per_endpoint: default_connections_per_endpoint(),
        }
    }

    /// Sets the number of connections per endpoint.
    #[must_use]
    pub const fn with_connections_per_endpoint(mut self, count: usize) -> Self {
        self.connections_per_endpoint = count;
        self
    }

    /// Returns the total number of connections the pool will hold.
    #[must_use]
    pub fn total_connections(&self) -> usize {
        self.endpoints.len() * self.connections_per_endpoint
    }
}

/// Configuration for conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Maximum time to wait for a connection when opening a conversation.
    #[serde(default = "default_lease_timeout")]
    pub lease_timeout_seconds: f64,
    /// Level used by [`crate::client::DriverClient`] helpers that do not
    /// take one explicitly.
    #[serde(default)]
    pub default_level: ConversationLevel,
}

const fn default_lease_timeout() -> f64 {
    5.0
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            lease_timeout_seconds: default_lease_timeout(),
            default_level: ConversationLevel::default(),
        }
    }
}

impl ConversationConfig {
    /// Creates a conversation configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lease timeout.
    #[must_use]
    pub fn with_lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout_seconds = timeout.as_secs_f64();
        self
    }

    /// Sets the default level.
    #[must_use]
    pub const fn with_default_level(mut self, level: ConversationLevel) -> Self {
        self.default_level = level;
        self
    }

    /// Gets the lease timeout as a Duration.
    ///
    /// Invalid values clamp to zero, which means a single non-waiting attempt.
    #[must_use]
    pub fn lease_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.lease_timeout_seconds).unwrap_or(Duration::ZERO)
    }
}

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directives used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info,pinflow=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

/// Configuration for the synchronous facade.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlockingConfig {
    /// Worker threads of the runtime owned by the blocking client.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

const fn default_worker_threads() -> usize {
    2
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.pool.endpoints, vec!["127.0.0.1:8529".to_string()]);
        assert_eq!(config.pool.total_connections(), 4);
        assert_eq!(config.conversation.lease_timeout(), Duration::from_secs(5));
        assert_eq!(config.conversation.default_level, ConversationLevel::Required);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = DriverConfig::from_json(
            r#"{
                "pool": { "endpoints": ["a:1", "b:2"], "connections_per_endpoint": 3 },
                "conversation": { "lease_timeout_seconds": 0.25, "default_level": "preferred" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.pool.total_connections(), 6);
        assert_eq!(config.conversation.lease_timeout(), Duration::from_millis(250));
        assert_eq!(config.conversation.default_level, ConversationLevel::Preferred);
        assert_eq!(config.logging.filter, "info,pinflow=debug");
        assert_eq!(config.blocking.worker_threads, 2);
    }

    #[test]
    fn test_validation_rejects_empty_endpoints() {
        let result = DriverConfig::from_json(r#"{ "pool": { "endpoints": [] } }"#);
        assert!(matches!(result, Err(PinflowError::Config(_))));
    }

    #[test]
    fn test_validation_rejects_negative_timeout() {
        let mut config = DriverConfig::default();
        config.conversation.lease_timeout_seconds = -1.0;
        assert!(matches!(config.validate(), Err(PinflowError::Config(_))));
        assert_eq!(config.conversation.lease_timeout(), Duration::ZERO);
    }

    #[test]
    fn test_validation_rejects_zero_connections() {
        let config = DriverConfig::default()
            .with_pool(PoolConfig::new(["a:1"]).with_connections_per_endpoint(0));
        assert!(matches!(config.validate(), Err(PinflowError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "pool": {{ "endpoints": ["db:8529"] }} }}"#).unwrap();

        let config = DriverConfig::from_file(file.path()).unwrap();
        assert_eq!(config.pool.endpoints, vec!["db:8529".to_string()]);
    }

    #[test]
    fn test_from_missing_file() {
        let result = DriverConfig::from_file("/nonexistent/pinflow.json");
        assert!(matches!(result, Err(PinflowError::Io(_))));
    }
}
