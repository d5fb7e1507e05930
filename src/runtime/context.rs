//! Per-invocation context shared by every node task
//!
//! Holds the only two things node tasks share: the call semaphore and the
//! event sinks. Results never pass through here; they flow back to the
//! runner through the join set.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::{AdcsError, Result};
use crate::event::{EventEmitter, EventKind, EventLog};
use crate::format::FormattedValue;
use crate::provider::Backends;

pub(crate) struct NodeContext {
    pub backends: Backends,
    /// Raw request input handed to every provider
    pub input: Value,
    pub log: EventLog,
    observer: Arc<dyn EventEmitter>,
    calls: Semaphore,
    default_timeout: Duration,
    trace_outputs: bool,
}

impl NodeContext {
    pub fn new(
        backends: Backends,
        input: Value,
        log: EventLog,
        observer: Arc<dyn EventEmitter>,
        max_concurrent_calls: usize,
        default_timeout: Duration,
        trace_outputs: bool,
    ) -> Self {
        Self {
            backends,
            input,
            log,
            observer,
            calls: Semaphore::new(max_concurrent_calls),
            default_timeout,
            trace_outputs,
        }
    }

    /// Record in the invocation log and forward to the engine observer
    pub fn emit(&self, kind: EventKind) {
        self.observer.emit(kind.clone());
        self.log.emit(kind);
    }

    /// Output as it should appear in events
    pub fn traced(&self, value: &FormattedValue) -> Option<Value> {
        self.trace_outputs.then(|| value.to_json())
    }

    pub fn timeout_for(&self, declared: Option<Duration>) -> Duration {
        declared.unwrap_or(self.default_timeout)
    }

    /// Run one external call under a call slot and the node timeout
    ///
    /// The timeout starts once the slot is held.
    pub async fn external<T, F>(&self, node_id: &str, timeout: Duration, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self.calls.acquire().await.map_err(|_| AdcsError::Internal {
            reason: "call semaphore closed".to_string(),
        })?;

        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = timeout.as_millis() as u64;
                warn!(node_id = %node_id, timeout_ms, "external call timed out");
                Err(AdcsError::NodeTimeout {
                    node_id: node_id.to_string(),
                    timeout_ms,
                })
            }
        }
    }

    #[cfg(test)]
    pub fn available_calls(&self) -> usize {
        self.calls.available_permits()
    }
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("backends", &self.backends)
            .field("calls", &self.calls.available_permits())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}
