//! Event sink trait and implementations.

use super::ConversationEvent;
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, trace, Level};

/// Receives conversation lifecycle events.
///
/// Sinks are called on the release path, including from `Drop`, so
/// [`EventSink::try_emit`] must never block or panic.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>);

    /// Emits an event without blocking. Errors are swallowed.
    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>);
}

/// Discards all events. Used when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<serde_json::Value>) {}
}

/// Writes events to the tracing subscriber.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::DEBUG }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink with the given level.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub const fn info() -> Self {
        Self::new(Level::INFO)
    }

    fn log_event(&self, event_type: &str, data: Option<&serde_json::Value>) {
        if self.level == Level::TRACE {
            trace!(event_type = %event_type, event_data = ?data, "Conversation event");
        } else if self.level == Level::DEBUG {
            debug!(event_type = %event_type, event_data = ?data, "Conversation event");
        } else {
            info!(event_type = %event_type, event_data = ?data, "Conversation event");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.log_event(event_type, data.as_ref());
    }
}

/// Keeps every event in memory. Meant for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(String, Option<serde_json::Value>)>>,
}

impl CollectingEventSink {
    /// Creates an empty collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.events.read().clone()
    }

    /// Returns the event types in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count(&self, event: ConversationEvent) -> usize {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t == event.as_str())
            .count()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Drops all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<serde_json::Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_and_logging_sinks_accept_events() {
        NoOpEventSink.emit("conversation.opened", None).await;
        let sink = LoggingEventSink::info();
        sink.emit("conversation.opened", Some(serde_json::json!({"connection_id": 1})))
            .await;
        LoggingEventSink::default().try_emit("conversation.released", None);
    }

    #[tokio::test]
    async fn test_collecting_sink_counts_by_kind() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(ConversationEvent::Opened.as_str(), None).await;
        sink.try_emit(ConversationEvent::Released.as_str(), None);
        sink.try_emit(ConversationEvent::Opened.as_str(), None);

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.count(ConversationEvent::Opened), 2);
        assert_eq!(sink.count(ConversationEvent::Rejected), 0);
        assert_eq!(
            sink.event_types(),
            vec![
                "conversation.opened".to_string(),
                "conversation.released".to_string(),
                "conversation.opened".to_string(),
            ]
        );

        sink.clear();
        assert!(sink.is_empty());
    }
}
