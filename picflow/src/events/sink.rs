//! Event sinks for upload progress and notifications.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn, Level};

/// Receives pipeline events.
///
/// Hosts plug in a sink to drive progress bars and notifications.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event.
    async fn emit(&self, event_type: &str, data: Option<Value>);

    /// Emits an event without awaiting. Must never panic.
    fn try_emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}

    fn try_emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Mirrors events into `tracing`.
///
/// Failure events are always logged at `WARN`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a sink logging at `level`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event_type: &str, data: Option<&Value>) {
        if event_type == super::UPLOAD_FAILED {
            warn!(event_type, event_data = ?data, "Upload event");
        } else if self.level == Level::DEBUG || self.level == Level::TRACE {
            debug!(event_type, event_data = ?data, "Upload event");
        } else {
            info!(event_type, event_data = ?data, "Upload event");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.log_event(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.log_event(event_type, data.as_ref());
    }
}

/// Keeps every event in memory, for tests and hosts that poll.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<(String, Option<Value>)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events so far, in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.read().clone()
    }

    /// Event names in emission order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events.read().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Payloads of events named exactly `event_type`.
    #[must_use]
    pub fn payloads(&self, event_type: &str) -> Vec<Value> {
        self.events
            .read()
            .iter()
            .filter(|(n, _)| n == event_type)
            .map(|(_, d)| d.clone().unwrap_or(Value::Null))
            .collect()
    }

    /// Events whose name starts with `prefix`.
    #[must_use]
    pub fn events_of_type(&self, prefix: &str) -> Vec<(String, Option<Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(n, _)| n.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether no events were collected.
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
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.try_emit(event_type, data);
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}
