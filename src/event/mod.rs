//! Event Module - observability hook for graph invocations
//!
//! Key types:
//! - `Event`: envelope with id + timestamp + kind
//! - `EventKind`: invocation, node and fine-grained events
//! - `EventLog`: thread-safe, append-only log (one per invocation)
//! - `EventEmitter`: trait for forwarding events to an external observer
//! - `NoopEmitter`: zero-cost default observer
//! - `TraceRecord`: per-node `{start, end, output, error}` derived from the log

mod emitter;
mod log;
mod trace;

pub use emitter::{EventEmitter, NoopEmitter};
pub use log::{Event, EventKind, EventLog};
pub use trace::{derive_trace, TraceError, TraceRecord};
