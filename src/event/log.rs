//! EventLog - append-only record of one invocation
//!
//! - Event: envelope with id + timestamp + kind
//! - EventKind: invocation / node / fine-grained levels
//! - EventLog: thread-safe, append-only log

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorKind;
use crate::format::OutputFormat;

/// Single event in the invocation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since invocation start (ms)
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

/// All possible event types
///
/// Node ids are `Arc<str>`, shared with the graph at no cost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // INVOCATION LEVEL
    // ═══════════════════════════════════════════
    InvocationStarted {
        invocation_id: Arc<str>,
        request_id: Arc<str>,
        graph_id: Arc<str>,
        node_count: usize,
    },
    InvocationCompleted {
        invocation_id: Arc<str>,
        terminal: Arc<str>,
        confidence: f64,
        /// Absent when output tracing is disabled
        output: Option<Value>,
    },
    InvocationFailed {
        invocation_id: Arc<str>,
        node_id: Option<Arc<str>>,
        code: String,
        error: String,
    },
    InvocationCancelled {
        invocation_id: Arc<str>,
        completed_nodes: usize,
    },

    // ═══════════════════════════════════════════
    // NODE LEVEL
    // ═══════════════════════════════════════════
    NodeScheduled {
        node_id: Arc<str>,
        wave: usize,
    },
    NodeStarted {
        node_id: Arc<str>,
        variant: String,
    },
    NodeCompleted {
        node_id: Arc<str>,
        confidence: f64,
        output: Option<Value>,
        duration_ms: u64,
    },
    NodeFailed {
        node_id: Arc<str>,
        code: String,
        error_kind: ErrorKind,
        error: String,
        duration_ms: u64,
    },

    // ═══════════════════════════════════════════
    // FINE-GRAINED
    // ═══════════════════════════════════════════
    ProviderCalled {
        node_id: Arc<str>,
        endpoint: String,
        model: String,
    },
    ProviderResponded {
        node_id: Arc<str>,
        confidence: f64,
        duration_ms: u64,
    },
    ModelCalled {
        node_id: Arc<str>,
        model: String,
        purpose: String,
    },
    InputDropped {
        node_id: Arc<str>,
        input_id: Arc<str>,
        reason: String,
    },
    ConflictResolved {
        node_id: Arc<str>,
        policy: String,
        chosen: Option<Arc<str>>,
    },
    FormatConverted {
        node_id: Arc<str>,
        from: String,
        to: OutputFormat,
        rule: String,
    },
    ChainTransition {
        node_id: Arc<str>,
        state: String,
    },

    // ═══════════════════════════════════════════
    // SETTLEMENT
    // ═══════════════════════════════════════════
    SettlementDelivered {
        request_id: Arc<str>,
        callback: String,
    },
}

impl EventKind {
    /// Node the event belongs to, if node-related
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeScheduled { node_id, .. }
            | Self::NodeStarted { node_id, .. }
            | Self::NodeCompleted { node_id, .. }
            | Self::NodeFailed { node_id, .. }
            | Self::ProviderCalled { node_id, .. }
            | Self::ProviderResponded { node_id, .. }
            | Self::ModelCalled { node_id, .. }
            | Self::InputDropped { node_id, .. }
            | Self::ConflictResolved { node_id, .. }
            | Self::FormatConverted { node_id, .. }
            | Self::ChainTransition { node_id, .. } => Some(node_id),
            Self::InvocationStarted { .. }
            | Self::InvocationCompleted { .. }
            | Self::InvocationFailed { .. }
            | Self::InvocationCancelled { .. }
            | Self::SettlementDelivered { .. } => None,
        }
    }

    pub fn is_invocation_event(&self) -> bool {
        matches!(
            self,
            Self::InvocationStarted { .. }
                | Self::InvocationCompleted { .. }
                | Self::InvocationFailed { .. }
                | Self::InvocationCancelled { .. }
        )
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    /// Create a new event log (call at invocation start)
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append an event, returning its id
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// All events, cloned
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Zero-copy access to events via callback
    ///
    /// Holds the read lock for the duration of the callback.
    pub fn with_events<T>(&self, f: impl FnOnce(&[Event]) -> T) -> T {
        f(&self.events.read())
    }

    pub fn filter_node(&self, node_id: &str) -> Vec<Event> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.node_id() == Some(node_id))
                .cloned()
                .collect()
        })
    }

    pub fn invocation_events(&self) -> Vec<Event> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.is_invocation_event())
                .cloned()
                .collect()
        })
    }

    pub fn count_node(&self, node_id: &str) -> usize {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.node_id() == Some(node_id))
                .count()
        })
    }

    /// Serialize to JSON for external logging
    pub fn to_json(&self) -> Value {
        self.with_events(|events| serde_json::to_value(events).unwrap_or(Value::Null))
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn started(id: &str) -> EventKind {
        EventKind::NodeStarted {
            node_id: Arc::from(id),
            variant: "provider".to_string(),
        }
    }

    #[test]
    fn ids_are_monotonic() {
        let log = EventLog::new();
        assert_eq!(log.emit(started("a")), 0);
        assert_eq!(log.emit(started("b")), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn filter_by_node() {
        let log = EventLog::new();
        log.emit(EventKind::InvocationStarted {
            invocation_id: "inv".into(),
            request_id: "req".into(),
            graph_id: "g".into(),
            node_count: 2,
        });
        log.emit(started("a"));
        log.emit(started("b"));
        log.emit(EventKind::NodeCompleted {
            node_id: "a".into(),
            confidence: 0.9,
            output: Some(json!(true)),
            duration_ms: 1,
        });

        assert_eq!(log.count_node("a"), 2);
        assert_eq!(log.filter_node("b").len(), 1);
        assert_eq!(log.invocation_events().len(), 1);
    }

    #[test]
    fn serializes_as_tagged_json() {
        let log = EventLog::new();
        log.emit(EventKind::FormatConverted {
            node_id: "out".into(),
            from: "score".into(),
            to: OutputFormat::StringAndUint256,
            rule: "label_score".into(),
        });
        let json = log.to_json();
        assert_eq!(json[0]["kind"]["type"], "format_converted");
        assert_eq!(json[0]["kind"]["to"], "StringAndUint256");
    }

    #[test]
    fn clones_share_the_log() {
        let log = EventLog::new();
        let clone = log.clone();
        clone.emit(started("a"));
        assert_eq!(log.len(), 1);
    }
}
