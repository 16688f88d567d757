//! Opening, scoping and releasing conversations.

use super::context::in_runtime;
use super::{Conversation, ConversationContext, ConversationLevel, ThreadConversation};
use crate::config::ConversationConfig;
use crate::connection::{Connection, ConnectionPool};
use crate::errors::{
    BlockingInRuntimeError, ConnectionUnavailableError, ConversationError, ReentrancyError,
};
use crate::events::{ConversationEvent, EventSink, NoOpEventSink};
use futures::{Stream, StreamExt};
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Creates, validates and releases conversations for one driver client.
///
/// Cloning is cheap; clones share the pool and the event sink.
#[derive(Clone)]
pub struct ConversationManager {
    pool: Arc<dyn ConnectionPool>,
    config: ConversationConfig,
    event_sink: Arc<dyn EventSink>,
}

impl ConversationManager {
    /// Creates a manager leasing from `pool`.
    #[must_use]
    pub fn new(pool: Arc<dyn ConnectionPool>, config: ConversationConfig) -> Self {
        Self {
            pool,
            config,
            event_sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the sink receiving lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the pool conversations lease from.
    #[must_use]
    pub fn pool(&self) -> &Arc<dyn ConnectionPool> {
        &self.pool
    }

    /// Returns the conversation configuration.
    #[must_use]
    pub const fn config(&self) -> &ConversationConfig {
        &self.config
    }

    /// Runs `work` with every request it issues pinned to one connection.
    ///
    /// Nothing happens until the returned future is polled. On first poll
    /// the ambient scope is checked: if a conversation is already active the
    /// future resolves to a [`ReentrancyError`] and `work` is never polled.
    /// Otherwise a connection is leased (bounded by the configured lease
    /// timeout), `work` runs with the conversation attached, and the
    /// connection is released exactly once however `work` ends: value,
    /// error, panic, or the returned future being dropped.
    ///
    /// The result of `work` is returned unchanged.
    pub async fn require_conversation<Fut, T, E>(&self, work: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: From<ConversationError>,
    {
        self.with_conversation(ConversationLevel::Required, work).await
    }

    /// Like [`ConversationManager::require_conversation`], but requests fall
    /// back to load-balanced routing if the pinned connection breaks.
    pub async fn prefer_conversation<Fut, T, E>(&self, work: Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: From<ConversationError>,
    {
        self.with_conversation(ConversationLevel::Preferred, work).await
    }

    /// Runs `work` in a conversation of the given level.
    pub async fn with_conversation<Fut, T, E>(
        &self,
        level: ConversationLevel,
        work: Fut,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: From<ConversationError>,
    {
        let guard = self.open(level).await?;
        let result = guard.context().scope(work).await;
        drop(guard);
        result
    }

    /// Pins every item of `stream` to one connection.
    ///
    /// The conversation opens on the first poll and is released when the
    /// inner stream ends or the returned stream is dropped. If opening
    /// fails, the error is yielded as the only item.
    pub fn require_conversation_stream<S, T, E>(
        &self,
        stream: S,
    ) -> impl Stream<Item = Result<T, E>>
    where
        S: Stream<Item = Result<T, E>>,
        E: From<ConversationError>,
    {
        let manager = self.clone();
        futures::stream::unfold(StreamState::Pending(Box::pin(stream)), move |state| {
            let manager = manager.clone();
            async move {
                let (mut stream, guard) = match state {
                    StreamState::Done => return None,
                    StreamState::Open(stream, guard) => (stream, guard),
                    StreamState::Pending(stream) => {
                        match manager.open(ConversationLevel::Required).await {
                            Ok(guard) => (stream, guard),
                            Err(err) => return Some((Err(E::from(err)), StreamState::Done)),
                        }
                    }
                };

                let item = guard.context().scope(stream.next()).await?;
                Some((item, StreamState::Open(stream, guard)))
            }
        })
    }

    /// Opens a conversation bound to the calling thread.
    ///
    /// Performs the same reentrancy check and lease as
    /// [`ConversationManager::require_conversation`], blocking the thread
    /// for at most the lease timeout. The conversation is released when the
    /// returned guard is released or dropped.
    ///
    /// Fails with [`BlockingInRuntimeError`] when called from a thread that
    /// is driving a tokio runtime. Async work started from a thread
    /// conversation does not see it implicitly; attach it with
    /// `ThreadConversation::context().scope(..)`.
    pub fn require_thread_conversation(&self) -> Result<ThreadConversation, ConversationError> {
        self.open_blocking(ConversationLevel::Required)
            .map(ThreadConversation::enter)
    }

    /// Preferred-level variant of
    /// [`ConversationManager::require_thread_conversation`].
    pub fn prefer_thread_conversation(&self) -> Result<ThreadConversation, ConversationError> {
        self.open_blocking(ConversationLevel::Preferred)
            .map(ThreadConversation::enter)
    }

    /// Returns the conversation of the ambient scope, if any.
    ///
    /// The returned conversation may already be released; callers routing
    /// requests must check its state.
    #[must_use]
    pub fn current_conversation(&self) -> Option<Arc<Conversation>> {
        ConversationContext::current().conversation().cloned()
    }

    async fn open(&self, level: ConversationLevel) -> Result<ConversationGuard, ConversationError> {
        self.check_reentrancy()?;
        let connection = self
            .pool
            .lease(self.config.lease_timeout())
            .await
            .map_err(|err| self.lease_failed(err))?;
        Ok(self.activate(level, connection))
    }

    fn open_blocking(&self, level: ConversationLevel) -> Result<ConversationGuard, ConversationError> {
        if in_runtime() {
            warn!(%level, "Refusing thread conversation inside an async runtime");
            return Err(BlockingInRuntimeError.into());
        }
        self.check_reentrancy()?;
        let connection = self
            .pool
            .lease_blocking(self.config.lease_timeout())
            .map_err(|err| self.lease_failed(err))?;
        Ok(self.activate(level, connection))
    }

    fn check_reentrancy(&self) -> Result<(), ConversationError> {
        let ambient = ConversationContext::current();
        match ambient.conversation() {
            Some(active) if active.is_active() => {
                warn!(
                    conversation_id = %active.id(),
                    connection_id = %active.connection().id(),
                    "Rejecting nested conversation"
                );
                self.event_sink.try_emit(
                    ConversationEvent::Rejected.as_str(),
                    Some(ConversationEvent::payload(active)),
                );
                Err(ReentrancyError::new(active.id()).into())
            }
            _ => Ok(()),
        }
    }

    fn lease_failed(&self, err: ConnectionUnavailableError) -> ConversationError {
        self.event_sink.try_emit(
            ConversationEvent::LeaseFailed.as_str(),
            Some(json!({
                "timeout_ms": u64::try_from(err.timeout.as_millis()).unwrap_or(u64::MAX),
                "pool_size": err.pool_size,
            })),
        );
        err.into()
    }

    fn activate(&self, level: ConversationLevel, connection: Connection) -> ConversationGuard {
        let conversation = Arc::new(Conversation::new(level, connection));
        conversation.activate();

        debug!(
            conversation_id = %conversation.id(),
            connection_id = %conversation.connection().id(),
            %level,
            "Conversation opened"
        );
        self.event_sink.try_emit(
            ConversationEvent::Opened.as_str(),
            Some(ConversationEvent::payload(&conversation)),
        );

        ConversationGuard {
            conversation,
            manager: self.clone(),
        }
    }

    fn release(&self, conversation: &Conversation) {
        if !conversation.mark_released() {
            return;
        }
        self.pool.release(conversation.connection());

        debug!(
            conversation_id = %conversation.id(),
            connection_id = %conversation.connection().id(),
            "Conversation released"
        );
        self.event_sink.try_emit(
            ConversationEvent::Released.as_str(),
            Some(ConversationEvent::payload(conversation)),
        );
    }
}

impl std::fmt::Debug for ConversationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationManager")
            .field("pool_size", &self.pool.size())
            .field("available", &self.pool.available())
            .field("lease_timeout", &self.config.lease_timeout())
            .finish()
    }
}

/// Releases its conversation when dropped.
pub(crate) struct ConversationGuard {
    conversation: Arc<Conversation>,
    manager: ConversationManager,
}

impl ConversationGuard {
    pub(crate) const fn conversation(&self) -> &Arc<Conversation> {
        &self.conversation
    }

    pub(crate) fn context(&self) -> ConversationContext {
        ConversationContext::new(self.conversation.clone())
    }
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        self.manager.release(&self.conversation);
    }
}

enum StreamState<S> {
    Pending(Pin<Box<S>>),
    Open(Pin<Box<S>>, ConversationGuard),
    Done,
}
