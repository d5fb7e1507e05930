//! Engine - graph catalog plus the shared pieces every invocation uses
//!
//! Graphs are registered once (validated, backends checked) and are read-only
//! afterwards. Each `execute` builds a fresh `Runner`, so invocations of the
//! same graph share nothing mutable.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::runner::{InvocationReport, Runner};
use super::InvocationRequest;
use crate::config::EngineConfig;
use crate::dag::{AdaptorGraph, ValidatedGraph};
use crate::error::{AdcsError, Result};
use crate::event::{EventEmitter, NoopEmitter};
use crate::provider::Backends;
use crate::settlement::{NoopSink, SettlementSink};

pub struct Engine {
    config: EngineConfig,
    backends: Backends,
    graphs: RwLock<FxHashMap<Arc<str>, ValidatedGraph>>,
    sink: Arc<dyn SettlementSink>,
    observer: Arc<dyn EventEmitter>,
}

impl Engine {
    pub fn new(config: EngineConfig, backends: Backends) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            backends,
            graphs: RwLock::new(FxHashMap::default()),
            sink: Arc::new(NoopSink),
            observer: Arc::new(NoopEmitter::new()),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn SettlementSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Receives every event of every invocation
    pub fn with_observer(mut self, observer: Arc<dyn EventEmitter>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Add a validated graph under `graph_id`
    ///
    /// Every endpoint and core model it names must be registered.
    pub fn register_graph(&self, graph_id: impl Into<Arc<str>>, graph: ValidatedGraph) -> Result<()> {
        let graph_id = graph_id.into();
        self.backends.check_graph(&graph)?;

        let mut graphs = self.graphs.write();
        if graphs.contains_key(&graph_id) {
            return Err(AdcsError::GraphAlreadyRegistered {
                graph_id: graph_id.to_string(),
            });
        }
        info!(graph = %graph_id, nodes = graph.len(), terminal = %graph.terminal_node().id, "registered graph");
        graphs.insert(graph_id, graph);
        Ok(())
    }

    /// Validate then register
    pub fn register(&self, graph_id: impl Into<Arc<str>>, graph: AdaptorGraph) -> Result<()> {
        self.register_graph(graph_id, graph.validate()?)
    }

    pub fn graph(&self, graph_id: &str) -> Option<ValidatedGraph> {
        self.graphs.read().get(graph_id).cloned()
    }

    /// Registered graph ids, sorted
    pub fn graph_ids(&self) -> Vec<Arc<str>> {
        let mut ids: Vec<Arc<str>> = self.graphs.read().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Runner for one invocation, for callers that want the trace after a failure
    pub fn runner(&self, graph_id: &str, request: InvocationRequest) -> Result<Runner> {
        let (graph_id, graph) = self
            .graphs
            .read()
            .get_key_value(graph_id)
            .map(|(id, graph)| (Arc::clone(id), graph.clone()))
            .ok_or_else(|| AdcsError::UnknownGraph {
                graph_id: graph_id.to_string(),
            })?;

        Ok(Runner::new(
            graph_id,
            graph,
            request,
            &self.config,
            self.backends.clone(),
            Arc::clone(&self.observer),
            Arc::clone(&self.sink),
        ))
    }

    pub async fn execute(
        &self,
        graph_id: &str,
        request: InvocationRequest,
        cancel: CancellationToken,
    ) -> Result<InvocationReport> {
        let mut runner = self.runner(graph_id, request)?;
        runner.run(cancel).await
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("backends", &self.backends)
            .field("graphs", &self.graph_ids())
            .finish()
    }
}
