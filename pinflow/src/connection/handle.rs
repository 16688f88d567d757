//! Connection handles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of a pooled connection, unique within its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a connection id from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A handle to a connection owned by a pool.
///
/// Handles are cheap to clone. Ownership of the underlying connection is
/// tracked by the pool, not by the handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    id: ConnectionId,
    endpoint: Arc<str>,
}

impl Connection {
    /// Creates a new connection handle.
    #[must_use]
    pub fn new(id: ConnectionId, endpoint: impl Into<Arc<str>>) -> Self {
        Self {
            id,
            endpoint: endpoint.into(),
        }
    }

    /// Returns the connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the endpoint this connection talks to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let conn = Connection::new(ConnectionId::new(7), "db:8529");
        assert_eq!(conn.to_string(), "conn-7 [db:8529]");
        assert_eq!(conn.id().as_u64(), 7);
        assert_eq!(conn.endpoint(), "db:8529");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let json = serde_json::to_value(ConnectionId::new(3)).unwrap();
        assert_eq!(json, serde_json::json!(3));
    }
}
