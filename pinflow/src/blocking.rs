//! Synchronous facade over [`DriverClient`].
//!
//! Conversations opened here are bound to the calling thread: every
//! [`BlockingClient::execute`] made by that thread while the
//! [`ThreadConversation`] guard is held goes to the pinned connection.
//!
//! ```rust,ignore
//! let client = BlockingClient::new(driver)?;
//! let conversation = client.require_conversation()?;
//! let first = client.execute(Request::post("_system", "/_api/cursor"))?;
//! let next = client.execute(Request::put("_system", "/_api/cursor/42"))?;
//! drop(conversation);
//! ```

use crate::client::DriverClient;
use crate::communication::{Request, Response};
use crate::conversation::{ConversationContext, ConversationLevel, ConversationManager, ThreadConversation};
use crate::errors::{ConversationError, PinflowError};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

/// Blocking driver client.
///
/// Owns the runtime its requests are driven on. Must not be created, used
/// or dropped from inside an async context.
pub struct BlockingClient {
    client: DriverClient,
    runtime: Runtime,
}

impl BlockingClient {
    /// Wraps `client`, starting a runtime sized by its blocking config.
    pub fn new(client: DriverClient) -> Result<Self, PinflowError> {
        let worker_threads = client.config().blocking.worker_threads.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name("pinflow-blocking")
            .enable_all()
            .build()?;
        debug!(worker_threads, "Blocking client started");
        Ok(Self { client, runtime })
    }

    /// Returns the wrapped async client.
    #[must_use]
    pub const fn client(&self) -> &DriverClient {
        &self.client
    }

    /// Returns the conversation manager.
    #[must_use]
    pub const fn conversation_manager(&self) -> &ConversationManager {
        self.client.conversation_manager()
    }

    /// Opens a required conversation bound to the calling thread.
    pub fn require_conversation(&self) -> Result<ThreadConversation, ConversationError> {
        self.conversation_manager().require_thread_conversation()
    }

    /// Opens a preferred conversation bound to the calling thread.
    pub fn prefer_conversation(&self) -> Result<ThreadConversation, ConversationError> {
        self.conversation_manager().prefer_thread_conversation()
    }

    /// Opens a conversation of the configured default level.
    pub fn conversation(&self) -> Result<ThreadConversation, ConversationError> {
        match self.client.config().conversation.default_level {
            ConversationLevel::Required => self.require_conversation(),
            ConversationLevel::Preferred => self.prefer_conversation(),
        }
    }

    /// Executes a request, blocking until the response arrives.
    ///
    /// The calling thread's conversation, if any, travels with the request.
    pub fn execute(&self, request: Request) -> Result<Response, PinflowError> {
        let context = ConversationContext::current();
        self.runtime
            .block_on(context.scope(self.client.execute(request)))
    }
}

impl std::fmt::Debug for BlockingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingClient")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionPool;
    use crate::errors::TransportError;
    use crate::events::ConversationEvent;
    use crate::testing::{assert_pool_idle, assert_single_connection, TestDriver};
    use std::sync::Arc;
    use std::time::Duration;

    fn blocking(driver: &TestDriver) -> BlockingClient {
        BlockingClient::new(driver.client.clone()).unwrap()
    }

    #[test]
    fn test_requests_under_thread_conversation_share_connection() {
        let driver = TestDriver::new(3);
        let client = blocking(&driver);

        let conversation = client.require_conversation().unwrap();
        let responses: Vec<Response> = (0..4)
            .map(|_| client.execute(Request::put("_system", "/_api/cursor/7")).unwrap())
            .collect();

        let connection = assert_single_connection(&responses);
        assert_eq!(connection, conversation.conversation().connection().id());
        assert!(driver.communication.calls().iter().all(|call| call.pinned == Some(connection)));

        drop(conversation);
        assert_pool_idle(driver.pool.as_ref());
        assert_eq!(driver.events.count(ConversationEvent::Released), 1);
    }

    #[test]
    fn test_requests_without_conversation_are_load_balanced() {
        let driver = TestDriver::new(2);
        let client = blocking(&driver);

        client.execute(Request::get("_system", "/_api/version")).unwrap();

        let calls = driver.communication.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].pinned, None);
        assert_pool_idle(driver.pool.as_ref());
    }

    #[test]
    fn test_request_after_release_is_load_balanced() {
        let driver = TestDriver::new(2);
        let client = blocking(&driver);

        let mut conversation = client.require_conversation().unwrap();
        client.execute(Request::get("_system", "/_api/version")).unwrap();
        conversation.release();
        client.execute(Request::get("_system", "/_api/version")).unwrap();

        let pinned: Vec<_> = driver.communication.calls().iter().map(|call| call.pinned).collect();
        assert!(pinned[0].is_some());
        assert_eq!(pinned[1], None);
    }

    #[test]
    fn test_second_thread_conversation_is_rejected() {
        let driver = TestDriver::new(2);
        let client = blocking(&driver);

        let _outer = client.require_conversation().unwrap();
        let nested = client.require_conversation();

        assert!(matches!(nested, Err(ConversationError::Reentrancy(_))));
        assert_eq!(driver.pool.available(), 1);
    }

    #[test]
    fn test_threads_hold_independent_conversations() {
        let driver = TestDriver::new(2);
        let client = Arc::new(blocking(&driver));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let client = client.clone();
                std::thread::spawn(move || {
                    let conversation = client.require_conversation().unwrap();
                    let responses: Vec<Response> = (0..3)
                        .map(|_| client.execute(Request::get("_system", "/_api/version")).unwrap())
                        .collect();
                    let served = assert_single_connection(&responses);
                    assert_eq!(served, conversation.conversation().connection().id());
                    // Hold the lease until both threads have one.
                    std::thread::sleep(Duration::from_millis(20));
                    served
                })
            })
            .collect();

        let served: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_ne!(served[0], served[1]);
        assert_pool_idle(driver.pool.as_ref());
    }

    #[test]
    fn test_transport_failure_keeps_conversation_open() {
        let driver = TestDriver::new(1);
        let client = blocking(&driver);
        driver.communication.fail_next(TransportError::new("connection reset"));

        let conversation = client.require_conversation().unwrap();
        let failed = client.execute(Request::get("_system", "/_api/version"));
        assert!(matches!(failed, Err(PinflowError::Transport(_))));

        let response = client.execute(Request::get("_system", "/_api/version")).unwrap();
        assert_eq!(response.connection, conversation.conversation().connection().id());
    }

    #[test]
    fn test_default_level_conversation() {
        let driver = TestDriver::new(1);
        let client = blocking(&driver);

        let conversation = client.conversation().unwrap();
        assert_eq!(conversation.conversation().level(), ConversationLevel::Required);
    }
}
