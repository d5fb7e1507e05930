//! Per-node trace derived from the event log
//!
//! One record per node that started: `{node_id, start, end, output, error?}`.
//! Nodes still running when an invocation was cancelled have no end.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;

use super::log::{Event, EventKind};
use crate::error::ErrorKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceError {
    pub code: String,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub node_id: Arc<str>,
    pub started_at_ms: u64,
    pub ended_at_ms: Option<u64>,
    pub confidence: Option<f64>,
    pub output: Option<Value>,
    pub error: Option<TraceError>,
}

impl TraceRecord {
    pub fn is_success(&self) -> bool {
        self.ended_at_ms.is_some() && self.error.is_none()
    }
}

/// Fold node events into trace records, in start order
pub fn derive_trace(events: &[Event]) -> Vec<TraceRecord> {
    let mut records: Vec<TraceRecord> = Vec::new();
    let mut open: FxHashMap<Arc<str>, usize> = FxHashMap::default();

    for event in events {
        match &event.kind {
            EventKind::NodeStarted { node_id, .. } => {
                open.insert(Arc::clone(node_id), records.len());
                records.push(TraceRecord {
                    node_id: Arc::clone(node_id),
                    started_at_ms: event.timestamp_ms,
                    ended_at_ms: None,
                    confidence: None,
                    output: None,
                    error: None,
                });
            }
            EventKind::NodeCompleted {
                node_id,
                confidence,
                output,
                ..
            } => {
                if let Some(record) = open.remove(node_id).map(|idx| &mut records[idx]) {
                    record.ended_at_ms = Some(event.timestamp_ms);
                    record.confidence = Some(*confidence);
                    record.output = output.clone();
                }
            }
            EventKind::NodeFailed {
                node_id,
                code,
                error_kind,
                error,
                ..
            } => {
                if let Some(record) = open.remove(node_id).map(|idx| &mut records[idx]) {
                    record.ended_at_ms = Some(event.timestamp_ms);
                    record.error = Some(TraceError {
                        code: code.clone(),
                        kind: *error_kind,
                        message: error.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    records
}
