//! Propagation of the active conversation.
//!
//! Async work carries its context in a tokio task-local attached to the
//! future itself, so it follows the future across worker threads and
//! suspension points. Synchronous call chains use a thread-local that is
//! only valid on the thread that opened the conversation.

use super::Conversation;
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::futures::TaskLocalFuture;
use tokio::task::JoinHandle;

tokio::task_local! {
    static TASK_CONTEXT: ConversationContext;
}

thread_local! {
    static THREAD_CONTEXT: RefCell<ConversationContext> = RefCell::new(ConversationContext::none());
}

/// Read-only value naming the conversation a unit of work runs in, if any.
#[derive(Debug, Clone, Default)]
pub struct ConversationContext {
    conversation: Option<Arc<Conversation>>,
}

impl ConversationContext {
    /// A context with no conversation.
    #[must_use]
    pub const fn none() -> Self {
        Self { conversation: None }
    }

    /// A context carrying the given conversation.
    #[must_use]
    pub const fn new(conversation: Arc<Conversation>) -> Self {
        Self {
            conversation: Some(conversation),
        }
    }

    /// Returns the conversation carried by this context.
    #[must_use]
    pub const fn conversation(&self) -> Option<&Arc<Conversation>> {
        self.conversation.as_ref()
    }

    /// Returns true if the carried conversation is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.conversation
            .as_ref()
            .is_some_and(|conversation| conversation.is_active())
    }

    /// Returns the ambient context.
    ///
    /// A context attached to the current task wins. The calling thread's
    /// context is only consulted outside an async runtime: tasks scheduled
    /// on a runtime thread never inherit a thread-bound conversation.
    #[must_use]
    pub fn current() -> Self {
        if let Ok(context) = TASK_CONTEXT.try_with(Self::clone) {
            return context;
        }
        if in_runtime() {
            return Self::none();
        }
        THREAD_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Attaches this context to a future.
    ///
    /// Every poll of `future`, on whichever thread, observes this context as
    /// the ambient one.
    pub fn scope<F: Future>(self, future: F) -> TaskLocalFuture<Self, F> {
        TASK_CONTEXT.scope(self, future)
    }

    /// Installs `context` as the calling thread's context, returning the
    /// previous one.
    pub(crate) fn replace_thread(context: Self) -> Self {
        THREAD_CONTEXT.with(|ctx| ctx.replace(context))
    }
}

/// Returns true if the calling thread is driving a tokio runtime.
pub(crate) fn in_runtime() -> bool {
    Handle::try_current().is_ok()
}

/// Spawns a task that inherits the caller's conversation context.
///
/// Tasks spawned with `tokio::spawn` start without a context; use this when
/// a conversation's work fans out into separate tasks.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::spawn(ConversationContext::current().scope(future))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, ConnectionId};
    use crate::conversation::ConversationLevel;

    fn active_context(id: u64) -> ConversationContext {
        let conversation = Arc::new(Conversation::new(
            ConversationLevel::Required,
            Connection::new(ConnectionId::new(id), "db:8529"),
        ));
        conversation.activate();
        ConversationContext::new(conversation)
    }

    fn current_connection() -> Option<ConnectionId> {
        ConversationContext::current()
            .conversation()
            .map(|conversation| conversation.connection().id())
    }

    #[test]
    fn test_default_is_empty() {
        let ctx = ConversationContext::current();
        assert!(ctx.conversation().is_none());
        assert!(!ctx.is_active());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_scope_survives_suspension() {
        let ctx = active_context(9);
        let observed = ctx
            .scope(async {
                let mut seen = Vec::new();
                for _ in 0..8 {
                    tokio::task::yield_now().await;
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                    seen.push(current_connection());
                }
                seen
            })
            .await;

        assert!(observed.iter().all(|id| *id == Some(ConnectionId::new(9))));
        assert_eq!(current_connection(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_spawn_inherits_context() {
        let ctx = active_context(4);
        let inherited = ctx
            .scope(async {
                let child = spawn(async { current_connection() });
                let plain = tokio::spawn(async { current_connection() });
                (child.await.unwrap(), plain.await.unwrap())
            })
            .await;

        assert_eq!(inherited, (Some(ConnectionId::new(4)), None));
    }

    #[test]
    fn test_thread_context_is_thread_bound() {
        let previous = ConversationContext::replace_thread(active_context(2));
        assert_eq!(current_connection(), Some(ConnectionId::new(2)));

        let other = std::thread::spawn(current_connection).join().unwrap();
        assert_eq!(other, None);

        ConversationContext::replace_thread(previous);
        assert_eq!(current_connection(), None);
    }

    #[test]
    fn test_thread_context_not_visible_inside_runtime() {
        let previous = ConversationContext::replace_thread(active_context(2));
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let (inside, spawned) = runtime.block_on(async {
            let spawned = tokio::spawn(async { current_connection() });
            (current_connection(), spawned.await.unwrap())
        });
        assert_eq!(inside, None);
        assert_eq!(spawned, None);
        assert_eq!(current_connection(), Some(ConnectionId::new(2)));
        ConversationContext::replace_thread(previous);
    }

    #[test]
    fn test_task_context_overrides_thread_context() {
        let previous = ConversationContext::replace_thread(active_context(2));
        let seen = tokio_test::block_on(active_context(5).scope(async { current_connection() }));
        assert_eq!(seen, Some(ConnectionId::new(5)));
        ConversationContext::replace_thread(previous);
    }
}
