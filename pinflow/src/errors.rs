//! Error types for pinflow.
//!
//! Conversation failures are modelled as one struct per failure kind, all
//! gathered under [`ConversationError`]. Anything a driver call can fail with
//! is gathered under [`PinflowError`].

use crate::connection::ConnectionId;
use crate::conversation::ConversationId;
use std::time::Duration;
use thiserror::Error;

/// The main error type for pinflow operations.
#[derive(Debug, Error)]
pub enum PinflowError {
    /// A conversation could not be opened or used.
    #[error("{0}")]
    Conversation(#[from] ConversationError),

    /// The communication layer failed to execute a request.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Invalid driver configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for PinflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Failures raised by the conversation layer itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConversationError {
    /// A conversation was requested inside an already active one.
    #[error("{0}")]
    Reentrancy(#[from] ReentrancyError),

    /// The pool could not supply a connection in time.
    #[error("{0}")]
    ConnectionUnavailable(#[from] ConnectionUnavailableError),

    /// A request was routed through a released conversation.
    #[error("{0}")]
    UsedAfterRelease(#[from] UsedAfterReleaseError),

    /// The pinned connection of a required conversation broke.
    #[error("{0}")]
    PinnedConnectionLost(#[from] PinnedConnectionLostError),

    /// A thread-bound conversation was requested from inside an async
    /// runtime.
    #[error("{0}")]
    BlockingInRuntime(#[from] BlockingInRuntimeError),
}

impl ConversationError {
    /// Returns true if a later attempt may succeed.
    ///
    /// Only pool exhaustion is transient. Pinflow never retries on its own.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionUnavailable(_))
    }
}

/// Raised when a conversation is requested while one is already active in
/// the same scope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("conversation {active} is already active in this scope; nested conversations are not allowed")]
pub struct ReentrancyError {
    /// The conversation that is already active.
    pub active: ConversationId,
}

impl ReentrancyError {
    /// Creates a new reentrancy error.
    #[must_use]
    pub const fn new(active: ConversationId) -> Self {
        Self { active }
    }
}

/// Raised when the pool has no free connection within the lease timeout.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no connection available within {timeout:?} (pool size: {pool_size})")]
pub struct ConnectionUnavailableError {
    /// The lease timeout that was exceeded.
    pub timeout: Duration,
    /// The total number of connections in the pool.
    pub pool_size: usize,
}

impl ConnectionUnavailableError {
    /// Creates a new connection unavailable error.
    #[must_use]
    pub const fn new(timeout: Duration, pool_size: usize) -> Self {
        Self { timeout, pool_size }
    }
}

/// Raised when a request targets a conversation that was already released.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("conversation {conversation} was released; refusing to route request to connection {connection}")]
pub struct UsedAfterReleaseError {
    /// The released conversation.
    pub conversation: ConversationId,
    /// The connection it used to pin.
    pub connection: ConnectionId,
}

/// Raised when the pinned connection of a required conversation is no
/// longer usable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("pinned connection {connection} of conversation {conversation} is unavailable")]
pub struct PinnedConnectionLostError {
    /// The affected conversation.
    pub conversation: ConversationId,
    /// The broken connection.
    pub connection: ConnectionId,
}

/// Raised when a thread-bound conversation is requested on a thread that is
/// driving an async runtime.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Default)]
#[error("thread conversations cannot be opened inside an async runtime; use require_conversation instead")]
pub struct BlockingInRuntimeError;

/// Raised by the communication layer when a request fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    /// The error message.
    pub message: String,
    /// Response status, when the server answered.
    pub status: Option<u16>,
}

impl TransportError {
    /// Creates a transport error without a status.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// Sets the response status.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_is_retryable() {
        let unavailable: ConversationError =
            ConnectionUnavailableError::new(Duration::from_millis(5), 2).into();
        let reentrant: ConversationError = ReentrancyError::new(ConversationId::new()).into();

        assert!(unavailable.is_retryable());
        assert!(!reentrant.is_retryable());
        assert!(!ConversationError::from(BlockingInRuntimeError).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ConnectionUnavailableError::new(Duration::from_secs(1), 4);
        assert_eq!(
            err.to_string(),
            "no connection available within 1s (pool size: 4)"
        );

        let transport = TransportError::new("connection reset").with_status(503);
        assert_eq!(transport.to_string(), "connection reset");
        assert_eq!(transport.status, Some(503));
    }

    #[test]
    fn test_conversation_error_into_pinflow_error() {
        let id = ConversationId::new();
        let err: PinflowError = ConversationError::from(ReentrancyError::new(id)).into();
        assert!(matches!(
            err,
            PinflowError::Conversation(ConversationError::Reentrancy(ReentrancyError { active })) if active == id
        ));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: PinflowError = parse_err.into();
        assert!(matches!(err, PinflowError::Serialization(_)));
    }
}
