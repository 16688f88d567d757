//! Scoped conversations for synchronous callers.

use super::manager::ConversationGuard;
use super::{Conversation, ConversationContext};
use std::marker::PhantomData;
use std::sync::Arc;

/// A conversation bound to the thread that opened it.
///
/// While held, driver calls made by the owning thread are pinned to the
/// conversation's connection. The conversation is released by
/// [`ThreadConversation::release`] or when the guard goes out of scope,
/// whichever comes first.
///
/// The guard cannot be sent to another thread.
///
/// ```rust,ignore
/// let conversation = client.conversation_manager().require_thread_conversation()?;
/// client.execute(Request::get("_system", "/_api/cursor/123"))?;
/// // released here
/// ```
pub struct ThreadConversation {
    guard: Option<ConversationGuard>,
    conversation: Arc<Conversation>,
    previous: Option<ConversationContext>,
    _thread_bound: PhantomData<*const ()>,
}

impl ThreadConversation {
    pub(crate) fn enter(guard: ConversationGuard) -> Self {
        let conversation = guard.conversation().clone();
        let previous = ConversationContext::replace_thread(guard.context());
        Self {
            guard: Some(guard),
            conversation,
            previous: Some(previous),
            _thread_bound: PhantomData,
        }
    }

    /// Returns the conversation held by this guard.
    #[must_use]
    pub const fn conversation(&self) -> &Arc<Conversation> {
        &self.conversation
    }

    /// Returns a context carrying this conversation, for handing to async
    /// work explicitly.
    #[must_use]
    pub fn context(&self) -> ConversationContext {
        ConversationContext::new(self.conversation.clone())
    }

    /// Returns true once the conversation has been released.
    #[must_use]
    pub const fn is_released(&self) -> bool {
        self.guard.is_none()
    }

    /// Releases the conversation. Calling this again has no effect.
    pub fn release(&mut self) {
        let Some(guard) = self.guard.take() else {
            return;
        };
        if let Some(previous) = self.previous.take() {
            ConversationContext::replace_thread(previous);
        }
        drop(guard);
    }
}

impl Drop for ThreadConversation {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ThreadConversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadConversation")
            .field("conversation", &self.conversation)
            .field("released", &self.is_released())
            .finish()
    }
}
