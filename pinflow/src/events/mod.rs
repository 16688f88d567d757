//! Conversation lifecycle events.
//!
//! The manager reports every open, release and rejection to an
//! [`EventSink`] owned by the driver client.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::conversation::Conversation;
use serde_json::json;
use std::fmt;

/// Kinds of lifecycle events emitted by the conversation manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationEvent {
    /// A connection was leased and a conversation became active.
    Opened,
    /// A conversation ended and its connection went back to the pool.
    Released,
    /// A nested conversation was refused.
    Rejected,
    /// No connection could be leased in time.
    LeaseFailed,
}

impl ConversationEvent {
    /// Returns the event type string passed to sinks.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Opened => "conversation.opened",
            Self::Released => "conversation.released",
            Self::Rejected => "conversation.rejected",
            Self::LeaseFailed => "conversation.lease_failed",
        }
    }

    /// Builds the standard payload describing a conversation.
    #[must_use]
    pub fn payload(conversation: &Conversation) -> serde_json::Value {
        json!({
            "conversation_id": conversation.id(),
            "connection_id": conversation.connection().id(),
            "endpoint": conversation.connection().endpoint(),
            "level": conversation.level(),
            "state": conversation.state(),
            "opened_at": conversation.opened_at(),
        })
    }
}

impl fmt::Display for ConversationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{Connection, ConnectionId};
    use crate::conversation::ConversationLevel;

    #[test]
    fn test_event_names() {
        assert_eq!(ConversationEvent::Opened.as_str(), "conversation.opened");
        assert_eq!(ConversationEvent::LeaseFailed.to_string(), "conversation.lease_failed");
    }

    #[test]
    fn test_payload_fields() {
        let conversation = Conversation::new(
            ConversationLevel::Preferred,
            Connection::new(ConnectionId::new(3), "db:8529"),
        );
        let payload = ConversationEvent::payload(&conversation);

        assert_eq!(payload["connection_id"], json!(3));
        assert_eq!(payload["endpoint"], json!("db:8529"));
        assert_eq!(payload["level"], json!("preferred"));
        assert_eq!(payload["state"], json!("created"));
        assert_eq!(payload["conversation_id"], json!(conversation.id().to_string()));
    }
}
