//! Driver fixture for tests.

use std::sync::Arc;
use std::time::Duration;

use super::RecordingCommunication;
use crate::client::DriverClient;
use crate::config::{ConversationConfig, DriverConfig};
use crate::connection::{Connection, ConnectionId, StaticConnectionPool};
use crate::conversation::ConversationManager;
use crate::events::CollectingEventSink;

/// A [`DriverClient`] wired to an in-memory transport, with handles on
/// every part a test may want to inspect.
pub struct TestDriver {
    /// The pool conversations lease from.
    pub pool: Arc<StaticConnectionPool>,
    /// The transport recording every request.
    pub communication: Arc<RecordingCommunication>,
    /// Collected lifecycle events.
    pub events: Arc<CollectingEventSink>,
    /// The client under test.
    pub client: DriverClient,
}

impl TestDriver {
    /// Creates a driver over `connections` connections with a short lease
    /// timeout.
    #[must_use]
    pub fn new(connections: u64) -> Self {
        Self::build(connections, |pool| RecordingCommunication::new(pool), Duration::from_millis(50))
    }

    /// Like [`TestDriver::new`], with every response delayed by `latency`.
    #[must_use]
    pub fn with_latency(connections: u64, latency: Duration) -> Self {
        Self::build(
            connections,
            |pool| RecordingCommunication::new(pool).with_latency(latency),
            Duration::from_millis(50),
        )
    }

    /// Like [`TestDriver::new`], with a custom lease timeout.
    #[must_use]
    pub fn with_lease_timeout(connections: u64, lease_timeout: Duration) -> Self {
        Self::build(connections, |pool| RecordingCommunication::new(pool), lease_timeout)
    }

    fn build(
        connections: u64,
        communication: impl FnOnce(Arc<StaticConnectionPool>) -> RecordingCommunication,
        lease_timeout: Duration,
    ) -> Self {
        let pool = Arc::new(StaticConnectionPool::new(
            (0..connections)
                .map(|id| Connection::new(ConnectionId::new(id), "test:8529"))
                .collect(),
        ));
        let communication = Arc::new(communication(pool.clone()));
        let events = Arc::new(CollectingEventSink::new());
        let config = DriverConfig::new()
            .with_conversation(ConversationConfig::new().with_lease_timeout(lease_timeout));
        let client = DriverClient::new(config, pool.clone(), communication.clone())
            .with_event_sink(events.clone());

        Self {
            pool,
            communication,
            events,
            client,
        }
    }

    /// Returns the client's conversation manager.
    #[must_use]
    pub const fn manager(&self) -> &ConversationManager {
        self.client.conversation_manager()
    }
}

impl std::fmt::Debug for TestDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestDriver")
            .field("client", &self.client)
            .field("communication", &self.communication)
            .finish_non_exhaustive()
    }
}
