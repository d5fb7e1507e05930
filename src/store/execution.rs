//! ExecutionResult - per-invocation node results, write-once per node id
//!
//! Owned by a single runner; node tasks hand their results back through the
//! join set and the runner records them here. Nothing is shared across
//! invocations and nothing is persisted.

use std::sync::Arc;
use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::error::AdcsError;
use crate::node::NodeOutput;

/// Outcome of one node
#[derive(Debug, Clone)]
pub enum NodeStatus {
    Completed(Arc<NodeOutput>),
    /// Kept as `Arc` so consumers can cite it as the cause of their own failure
    Failed(Arc<AdcsError>),
}

#[derive(Debug, Clone)]
pub struct NodeResult {
    pub status: NodeStatus,
    pub duration: Duration,
}

impl NodeResult {
    pub fn success(output: NodeOutput, duration: Duration) -> Self {
        Self {
            status: NodeStatus::Completed(Arc::new(output)),
            duration,
        }
    }

    pub fn failed(error: AdcsError, duration: Duration) -> Self {
        Self {
            status: NodeStatus::Failed(Arc::new(error)),
            duration,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, NodeStatus::Completed(_))
    }

    pub fn output(&self) -> Option<&Arc<NodeOutput>> {
        match &self.status {
            NodeStatus::Completed(output) => Some(output),
            NodeStatus::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&Arc<AdcsError>> {
        match &self.status {
            NodeStatus::Failed(error) => Some(error),
            NodeStatus::Completed(_) => None,
        }
    }
}

/// Results of one graph invocation
#[derive(Debug)]
pub struct ExecutionResult {
    results: FxHashMap<Arc<str>, NodeResult>,
}

impl ExecutionResult {
    pub fn new() -> Self {
        Self {
            results: FxHashMap::default(),
        }
    }

    /// Record a node's result; a second write for the same id is rejected
    pub fn insert(&mut self, node_id: Arc<str>, result: NodeResult) -> Result<(), AdcsError> {
        if self.results.contains_key(&node_id) {
            return Err(AdcsError::DuplicateResult {
                node_id: node_id.to_string(),
            });
        }
        self.results.insert(node_id, result);
        Ok(())
    }

    pub fn get(&self, node_id: &str) -> Option<&NodeResult> {
        self.results.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.results.contains_key(node_id)
    }

    pub fn is_success(&self, node_id: &str) -> bool {
        self.get(node_id).is_some_and(NodeResult::is_success)
    }

    /// Output of a completed node (O(1) clone)
    pub fn output(&self, node_id: &str) -> Option<Arc<NodeOutput>> {
        self.get(node_id).and_then(|r| r.output().cloned())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl Default for ExecutionResult {
    fn default() -> Self {
        Self::new()
    }
}
