//! Diagnostic events
//!
//! Recoverable mismatches (healed keys, stale list indices, unresolved
//! inputs, unknown blocks) never surface as errors. They are reported here
//! instead, so a host can log or display them while debugging.

use serde::{Deserialize, Serialize};

use crate::value::DataKind;

/// Trait for receiving engine events
///
/// This abstracts over the transport (log, channel, test collector) so the
/// engine can be embedded anywhere.
pub trait EventSink: Send + Sync {
    /// Send an event
    ///
    /// Returns an error if the event could not be delivered (e.g., channel closed)
    fn send(&self, event: EngineEvent) -> Result<(), EventError>;
}

/// Error when sending events fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// How a target key was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealStrategy {
    /// Requested key was present
    Exact,
    /// A conventional name for the field was present
    Convention,
    /// First entry of the expected type was used instead
    TypeMatch,
    /// Nothing matched; the entry was created with a default
    Created,
}

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    /// An operation targeted a different key than the one requested
    #[serde(rename_all = "camelCase")]
    KeyHealed {
        action: String,
        requested: Option<String>,
        resolved: String,
        strategy: HealStrategy,
    },

    /// A list operation addressed an item that does not exist
    #[serde(rename_all = "camelCase")]
    IndexOutOfRange {
        action: String,
        key: String,
        index: Option<usize>,
        item_id: Option<String>,
        len: usize,
    },

    /// An operation was abandoned because its input was empty
    #[serde(rename_all = "camelCase")]
    InputUnresolved { action: String, input_id: String },

    /// An entry of the wrong kind was overwritten to carry out an operation
    #[serde(rename_all = "camelCase")]
    ValueReplaced {
        action: String,
        key: String,
        previous: DataKind,
    },

    /// A block type with no registered renderer
    #[serde(rename_all = "camelCase")]
    UnknownBlock { tag: String },

    /// A countdown reached zero
    #[serde(rename_all = "camelCase")]
    TimerFinished { app_id: String },
}

/// Deliver an event, logging delivery failures
pub(crate) fn emit(sink: &dyn EventSink, event: EngineEvent) {
    if let Err(e) = sink.send(event) {
        log::warn!("Failed to deliver engine event: {}", e);
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: EngineEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// An event sink that forwards every event to the `log` facade
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn send(&self, event: EngineEvent) -> Result<(), EventError> {
        match &event {
            EngineEvent::KeyHealed { strategy: HealStrategy::Exact, .. } => {}
            EngineEvent::KeyHealed {
                action,
                requested,
                resolved,
                strategy,
            } => log::info!(
                "{}: healed key {:?} -> '{}' ({:?})",
                action,
                requested,
                resolved,
                strategy
            ),
            EngineEvent::IndexOutOfRange {
                action,
                key,
                index,
                item_id,
                len,
            } => log::warn!(
                "{}: no item at index {:?} / id {:?} in '{}' (len {})",
                action,
                index,
                item_id,
                key,
                len
            ),
            EngineEvent::InputUnresolved { action, input_id } => {
                log::debug!("{}: input '{}' is empty, skipping", action, input_id)
            }
            EngineEvent::ValueReplaced { action, key, previous } => {
                log::warn!("{}: replaced the {} in '{}'", action, previous, key)
            }
            EngineEvent::UnknownBlock { tag } => log::warn!("Unknown block type '{}'", tag),
            EngineEvent::TimerFinished { app_id } => log::info!("Timer finished for app {}", app_id),
        }
        Ok(())
    }
}

/// A vector-based event sink that collects events
///
/// Useful for testing to verify events were emitted correctly.
pub struct VecEventSink {
    events: std::sync::Mutex<Vec<EngineEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: EngineEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .map_err(|_| EventError {
                message: "Event buffer poisoned".to_string(),
            })?
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_event_sink() {
        let sink = VecEventSink::new();

        sink.send(EngineEvent::UnknownBlock {
            tag: "Sparkline".to_string(),
        })
        .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);

        match &events[0] {
            EngineEvent::UnknownBlock { tag } => assert_eq!(tag, "Sparkline"),
            _ => panic!("Expected UnknownBlock event"),
        }

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_null_and_log_sinks_accept_events() {
        let event = EngineEvent::InputUnresolved {
            action: "add-list-item".to_string(),
            input_id: "new-task".to_string(),
        };
        NullEventSink.send(event.clone()).unwrap();
        LogEventSink.send(event).unwrap();
    }

    #[test]
    fn test_event_serialization() {
        let event = EngineEvent::KeyHealed {
            action: "increment-count".to_string(),
            requested: Some("cups".to_string()),
            resolved: "count".to_string(),
            strategy: HealStrategy::TypeMatch,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "keyHealed");
        assert_eq!(json["strategy"], "type_match");
    }
}
