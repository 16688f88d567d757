//! Conversations: pinning a sequence of requests to one connection.
//!
//! This module provides:
//! - The `Conversation` record and its one-way state machine
//! - `ConversationContext`, the value that carries the active conversation
//!   through async work (task-local) and synchronous call chains
//!   (thread-local)
//! - `ConversationManager`, which opens, scopes and releases conversations
//! - `ThreadConversation`, the scoped guard for synchronous callers

mod context;
mod manager;
mod state;
mod thread;

pub use context::{spawn, ConversationContext};
pub use manager::ConversationManager;
pub use state::{Conversation, ConversationId, ConversationLevel, ConversationState};
pub use thread::ThreadConversation;
