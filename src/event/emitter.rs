//! EventEmitter Trait - where invocation events go besides the trace
//!
//! The runner always records into its own `EventLog`; an `EventEmitter`
//! registered on the engine sees every event as well.

use super::log::{EventKind, EventLog};

pub trait EventEmitter: Send + Sync {
    /// Emit an event and return its ID
    fn emit(&self, kind: EventKind) -> u64;
}

impl EventEmitter for EventLog {
    fn emit(&self, kind: EventKind) -> u64 {
        EventLog::emit(self, kind)
    }
}

/// No-op emitter (zero allocation, always returns 0)
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    pub fn new() -> Self {
        Self
    }
}

impl EventEmitter for NoopEmitter {
    fn emit(&self, _kind: EventKind) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn scheduled() -> EventKind {
        EventKind::NodeScheduled {
            node_id: Arc::from("a"),
            wave: 0,
        }
    }

    #[test]
    fn emitter_is_object_safe() {
        fn accepts_emitter(_: &dyn EventEmitter) {}
        accepts_emitter(&EventLog::new());
        accepts_emitter(&NoopEmitter::new());
    }

    #[test]
    fn event_log_as_emitter_records() {
        let log = EventLog::new();
        let emitter: Arc<dyn EventEmitter> = Arc::new(log.clone());
        assert_eq!(emitter.emit(scheduled()), 0);
        assert_eq!(emitter.emit(scheduled()), 1);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn noop_emitter_discards() {
        let noop = NoopEmitter::new();
        assert_eq!(noop.emit(scheduled()), 0);
        assert_eq!(noop.emit(scheduled()), 0);
    }
}
