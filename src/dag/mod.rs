//! DAG Module - Graph Model and Execution Planner
//!
//! Contains:
//! - `graph`: `AdaptorGraph`, the arena of declared nodes
//! - `validate`: construction-time checks, DFS cycle detection
//! - `planner`: Kahn topological order with declaration-order tie-break
//!
//! A graph only reaches the runtime as a `ValidatedGraph`; there is no way to
//! execute an `AdaptorGraph` that failed validation.

mod graph;
mod planner;
mod validate;

pub use graph::{AdaptorGraph, Adjacency, EdgeVec};
pub use planner::{plan, topological_order};
pub use validate::detect_cycle;

use std::ops::Deref;
use std::sync::Arc;

use crate::error::AdcsError;
use crate::node::Node;

impl AdaptorGraph {
    /// Run every construction-time check and freeze the graph
    pub fn validate(self) -> Result<ValidatedGraph, AdcsError> {
        validate::validate(self)
    }
}

/// Read-only graph that passed validation, with its plan
///
/// Cheap to clone; shared by every invocation of the same graph.
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    graph: Arc<AdaptorGraph>,
    adjacency: Adjacency,
    order: Vec<usize>,
    terminal: usize,
}

impl ValidatedGraph {
    pub fn adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    /// Node indices in execution order
    pub fn order_indices(&self) -> &[usize] {
        &self.order
    }

    /// Nodes in execution order
    pub fn order(&self) -> impl Iterator<Item = &Arc<Node>> + '_ {
        self.order.iter().map(|&idx| self.graph.node(idx))
    }

    pub fn terminal_index(&self) -> usize {
        self.terminal
    }

    pub fn terminal_node(&self) -> &Arc<Node> {
        self.graph.node(self.terminal)
    }
}

impl Deref for ValidatedGraph {
    type Target = AdaptorGraph;

    fn deref(&self) -> &Self::Target {
        &self.graph
    }
}
