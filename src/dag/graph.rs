//! AdaptorGraph - arena of declared nodes indexed by id
//!
//! Performance notes:
//! - Arc<str> ids, cloned for free into results and events
//! - FxHashMap id -> arena index
//! - SmallVec edge lists (most nodes have 0-4 neighbours)
//!
//! Edges live on the consuming node (its `inputs`); `adjacency()` turns them
//! into index pairs for traversal.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::AdcsError;
use crate::node::{Node, NodeKind};
use crate::util::validate_node_id;

/// Stack-allocated neighbour list
pub type EdgeVec = SmallVec<[usize; 4]>;

/// Index-based view of the edges
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    /// node index -> consumers of its output
    pub successors: Vec<EdgeVec>,
    /// node index -> inputs, in declaration order
    pub predecessors: Vec<EdgeVec>,
}

impl Adjacency {
    pub fn len(&self) -> usize {
        self.successors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    /// Nodes without consumers
    pub fn sinks(&self) -> impl Iterator<Item = usize> + '_ {
        self.successors
            .iter()
            .enumerate()
            .filter(|(_, succ)| succ.is_empty())
            .map(|(idx, _)| idx)
    }
}

/// Mutable graph under construction
#[derive(Debug, Clone, Default)]
pub struct AdaptorGraph {
    nodes: Vec<Arc<Node>>,
    index: FxHashMap<Arc<str>, usize>,
    terminal: Option<Arc<str>>,
}

impl AdaptorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a node; ids are unique and immutable
    pub fn add_node(&mut self, node: Node) -> Result<&mut Self, AdcsError> {
        validate_node_id(&node.id)?;
        if self.index.contains_key(&node.id) {
            return Err(AdcsError::DuplicateNode {
                id: node.id.to_string(),
            });
        }
        self.index.insert(Arc::clone(&node.id), self.nodes.len());
        self.nodes.push(Arc::new(node));
        Ok(self)
    }

    /// Add `source -> target`: target consumes source's output
    ///
    /// The source may be declared later; dangling sources are reported by
    /// `validate()`.
    pub fn add_edge(&mut self, source: &str, target: &str) -> Result<&mut Self, AdcsError> {
        let invalid = |reason: &str| AdcsError::InvalidEdge {
            source_id: source.to_string(),
            target_id: target.to_string(),
            reason: reason.to_string(),
        };

        let idx = *self.index.get(target).ok_or_else(|| AdcsError::DanglingReference {
            node_id: source.to_string(),
            missing: target.to_string(),
        })?;
        let node = Arc::make_mut(&mut self.nodes[idx]);

        match &mut node.kind {
            NodeKind::Provider(_) => return Err(invalid("providers have no inputs")),
            NodeKind::SingleInput(spec) | NodeKind::MultiInput(spec) => {
                if spec.inputs.iter().any(|i| i.as_ref() == source) {
                    return Err(invalid("edge already declared"));
                }
                spec.inputs.push(Arc::from(source));
            }
            NodeKind::Chained(spec) => {
                let reason = if spec.input.as_ref() == source {
                    "edge already declared"
                } else {
                    "chained adaptors consume exactly one upstream"
                };
                return Err(invalid(reason));
            }
        }
        Ok(self)
    }

    /// Name the node whose output is delivered to settlement
    pub fn set_terminal(&mut self, id: &str) -> &mut Self {
        self.terminal = Some(Arc::from(id));
        self
    }

    pub fn terminal(&self) -> Option<&str> {
        self.terminal.as_deref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> &Arc<Node> {
        &self.nodes[idx]
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Node>> {
        self.index.get(id).map(|&idx| &self.nodes[idx])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Resolve every input reference to an index pair
    pub fn adjacency(&self) -> Result<Adjacency, AdcsError> {
        let n = self.nodes.len();
        let mut adjacency = Adjacency {
            successors: vec![EdgeVec::new(); n],
            predecessors: vec![EdgeVec::new(); n],
        };

        for (target, node) in self.nodes.iter().enumerate() {
            for input in node.inputs() {
                let source = self
                    .index_of(input)
                    .ok_or_else(|| AdcsError::DanglingReference {
                        node_id: node.id.to_string(),
                        missing: input.to_string(),
                    })?;
                adjacency.successors[source].push(target);
                adjacency.predecessors[target].push(source);
            }
        }

        Ok(adjacency)
    }
}
