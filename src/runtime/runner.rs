//! Graph Runner - one invocation of one validated graph
//!
//! - Waves: every node whose inputs all have a recorded result runs together
//! - JoinSet for parallel node tasks; results come back as task output
//! - The runner loop is the only writer of the `ExecutionResult`
//! - Cancellation aborts in-flight tasks and skips settlement

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::adaptor::{apply_transform, collect_inputs};
use super::chain::run_chain;
use super::context::NodeContext;
use super::InvocationRequest;
use crate::config::EngineConfig;
use crate::dag::ValidatedGraph;
use crate::error::{AdcsError, Result};
use crate::event::{derive_trace, Event, EventEmitter, EventKind, EventLog, TraceRecord};
use crate::format::FormattedValue;
use crate::node::{Node, NodeKind, NodeOutput};
use crate::provider::{invoke, Backends};
use crate::settlement::{Delivery, SettlementSink};
use crate::store::{ExecutionResult, NodeResult, NodeStatus};

/// Outcome of a completed invocation
#[derive(Debug, Clone, Serialize)]
pub struct InvocationReport {
    pub request_id: Arc<str>,
    pub invocation_id: String,
    pub output: FormattedValue,
    pub confidence: f64,
    pub rationale: Option<String>,
    pub trace: Vec<TraceRecord>,
}

/// Result of one node task, handed back through the join set
struct NodeOutcome {
    index: usize,
    node_id: Arc<str>,
    result: NodeResult,
}

/// Runs one invocation; owns its `ExecutionResult` and event log
pub struct Runner {
    graph: ValidatedGraph,
    graph_id: Arc<str>,
    request: InvocationRequest,
    invocation_id: String,
    ctx: Arc<NodeContext>,
    sink: Arc<dyn SettlementSink>,
    results: ExecutionResult,
}

impl Runner {
    pub(crate) fn new(
        graph_id: Arc<str>,
        graph: ValidatedGraph,
        request: InvocationRequest,
        config: &EngineConfig,
        backends: Backends,
        observer: Arc<dyn EventEmitter>,
        sink: Arc<dyn SettlementSink>,
    ) -> Self {
        let ctx = NodeContext::new(
            backends,
            request.input.clone(),
            EventLog::new(),
            observer,
            config.max_concurrent_calls,
            config.default_node_timeout(),
            config.trace_outputs,
        );

        Self {
            graph,
            graph_id,
            request,
            invocation_id: uuid::Uuid::new_v4().to_string(),
            ctx: Arc::new(ctx),
            sink,
            results: ExecutionResult::new(),
        }
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn event_log(&self) -> &EventLog {
        &self.ctx.log
    }

    pub fn events(&self) -> Vec<Event> {
        self.ctx.log.events()
    }

    /// Per-node trace so far; still available after a failed run
    pub fn trace(&self) -> Vec<TraceRecord> {
        self.ctx.log.with_events(derive_trace)
    }

    pub fn results(&self) -> &ExecutionResult {
        &self.results
    }

    /// Execute every node, then hand the terminal value to settlement
    #[instrument(skip(self, cancel), fields(
        graph = %self.graph_id,
        request = %self.request.request_id,
        nodes = self.graph.len(),
    ))]
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<InvocationReport> {
        let started = Instant::now();
        info!(invocation = %self.invocation_id, "Starting invocation");

        self.ctx.emit(EventKind::InvocationStarted {
            invocation_id: Arc::from(self.invocation_id.as_str()),
            request_id: Arc::clone(&self.request.request_id),
            graph_id: Arc::clone(&self.graph_id),
            node_count: self.graph.len(),
        });

        if let Err(e) = self.execute_waves(&cancel).await {
            self.record_failure(&e);
            return Err(e);
        }

        let terminal = Arc::clone(self.graph.terminal_node());
        let output = match self.results.get(&terminal.id).map(|r| r.status.clone()) {
            Some(NodeStatus::Completed(output)) => output,
            Some(NodeStatus::Failed(error)) => {
                let error = (*error).clone();
                self.record_failure(&error);
                return Err(error);
            }
            None => {
                let error = AdcsError::Internal {
                    reason: format!("terminal '{}' has no result", terminal.id),
                };
                self.record_failure(&error);
                return Err(error);
            }
        };

        self.ctx.emit(EventKind::InvocationCompleted {
            invocation_id: Arc::from(self.invocation_id.as_str()),
            terminal: Arc::clone(&terminal.id),
            confidence: output.confidence,
            output: self.ctx.traced(&output.value),
        });

        if cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        self.settle(&output).await?;

        info!(
            invocation = %self.invocation_id,
            confidence = output.confidence,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Invocation completed"
        );

        Ok(InvocationReport {
            request_id: Arc::clone(&self.request.request_id),
            invocation_id: self.invocation_id.clone(),
            output: output.value.clone(),
            confidence: output.confidence,
            rationale: output.rationale.clone(),
            trace: self.trace(),
        })
    }

    async fn execute_waves(&mut self, cancel: &CancellationToken) -> Result<()> {
        let mut pending: Vec<usize> = self.graph.order_indices().to_vec();
        let mut wave = 0;

        while !pending.is_empty() {
            if cancel.is_cancelled() {
                return Err(self.cancelled());
            }

            let (ready, blocked): (Vec<usize>, Vec<usize>) =
                pending.iter().partition(|&&idx| self.is_ready(idx));
            if ready.is_empty() {
                return Err(AdcsError::Internal {
                    reason: format!("{} nodes can never become ready", blocked.len()),
                });
            }
            pending = blocked;

            let mut join_set = JoinSet::new();
            for idx in ready {
                let node = Arc::clone(self.graph.node(idx));
                let upstream = self.upstream_of(&node);
                let ctx = Arc::clone(&self.ctx);

                debug!(node_id = %node.id, wave, "scheduling node");
                ctx.emit(EventKind::NodeScheduled {
                    node_id: Arc::clone(&node.id),
                    wave,
                });
                join_set.spawn(async move { execute_node(idx, node, upstream, ctx).await });
            }

            while !join_set.is_empty() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        join_set.abort_all();
                        return Err(self.cancelled());
                    }
                    joined = join_set.join_next() => {
                        let Some(joined) = joined else { break };
                        let outcome = joined.map_err(|e| AdcsError::Internal {
                            reason: format!("node task failed to join: {}", e),
                        })?;
                        self.record(outcome, &mut join_set)?;
                    }
                }
            }
            wave += 1;
        }
        Ok(())
    }

    /// Store one node result; a failure nobody can tolerate ends the run
    fn record(&mut self, outcome: NodeOutcome, join_set: &mut JoinSet<NodeOutcome>) -> Result<()> {
        let NodeOutcome { index, node_id, result } = outcome;
        let fatal = match result.error() {
            Some(error) if !error.is_recoverable() => Some((**error).clone()),
            Some(error) => {
                if index != self.graph.terminal_index() {
                    warn!(node_id = %node_id, error = %error, "node failed; consumers decide");
                }
                None
            }
            None => None,
        };

        self.results.insert(node_id, result)?;
        if let Some(error) = fatal {
            join_set.abort_all();
            return Err(error);
        }
        Ok(())
    }

    fn is_ready(&self, idx: usize) -> bool {
        self.graph.adjacency().predecessors[idx]
            .iter()
            .all(|&pred| self.results.contains(&self.graph.node(pred).id))
    }

    /// Recorded results of the node's inputs, in declaration order
    fn upstream_of(&self, node: &Node) -> Vec<(Arc<str>, NodeStatus)> {
        node.inputs()
            .iter()
            .filter_map(|input| {
                self.results
                    .get(input)
                    .map(|result| (Arc::clone(input), result.status.clone()))
            })
            .collect()
    }

    async fn settle(&self, output: &NodeOutput) -> Result<()> {
        let delivery = Delivery {
            request_id: Arc::clone(&self.request.request_id),
            callback: self.request.callback.clone(),
            value: output.value.clone(),
            confidence: output.confidence,
            rationale: output.rationale.clone(),
        };

        if let Err(e) = self.sink.deliver(delivery).await {
            self.record_failure(&e);
            return Err(e);
        }
        self.ctx.emit(EventKind::SettlementDelivered {
            request_id: Arc::clone(&self.request.request_id),
            callback: self.request.callback.clone(),
        });
        Ok(())
    }

    fn cancelled(&self) -> AdcsError {
        warn!(invocation = %self.invocation_id, completed = self.results.len(), "Invocation cancelled");
        self.ctx.emit(EventKind::InvocationCancelled {
            invocation_id: Arc::from(self.invocation_id.as_str()),
            completed_nodes: self.results.len(),
        });
        AdcsError::Cancelled {
            invocation_id: self.invocation_id.clone(),
        }
    }

    fn record_failure(&self, error: &AdcsError) {
        if matches!(error, AdcsError::Cancelled { .. }) {
            return;
        }
        warn!(invocation = %self.invocation_id, code = error.code(), error = %error, "Invocation failed");
        self.ctx.emit(EventKind::InvocationFailed {
            invocation_id: Arc::from(self.invocation_id.as_str()),
            node_id: error.node_id().map(Arc::from),
            code: error.code().to_string(),
            error: error.to_string(),
        });
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("graph_id", &self.graph_id)
            .field("invocation_id", &self.invocation_id)
            .field("results", &self.results.len())
            .finish()
    }
}

/// Execute one node and emit its lifecycle events
#[instrument(name = "node", skip_all, fields(node_id = %node.id, variant = node.kind.variant()))]
async fn execute_node(
    index: usize,
    node: Arc<Node>,
    upstream: Vec<(Arc<str>, NodeStatus)>,
    ctx: Arc<NodeContext>,
) -> NodeOutcome {
    let start = Instant::now();
    let node_id = Arc::clone(&node.id);
    ctx.emit(EventKind::NodeStarted {
        node_id: Arc::clone(&node_id),
        variant: node.kind.variant().to_string(),
    });

    let result = match dispatch(&node, &upstream, &ctx).await {
        Ok(output) => {
            let duration = start.elapsed();
            ctx.emit(EventKind::NodeCompleted {
                node_id: Arc::clone(&node_id),
                confidence: output.confidence,
                output: ctx.traced(&output.value),
                duration_ms: duration.as_millis() as u64,
            });
            NodeResult::success(output, duration)
        }
        Err(e) => {
            let duration = start.elapsed();
            ctx.emit(EventKind::NodeFailed {
                node_id: Arc::clone(&node_id),
                code: e.code().to_string(),
                error_kind: e.kind(),
                error: e.to_string(),
                duration_ms: duration.as_millis() as u64,
            });
            NodeResult::failed(e, duration)
        }
    };

    NodeOutcome {
        index,
        node_id,
        result,
    }
}

async fn dispatch(node: &Node, upstream: &[(Arc<str>, NodeStatus)], ctx: &NodeContext) -> Result<NodeOutput> {
    let timeout = ctx.timeout_for(node.timeout());

    match &node.kind {
        NodeKind::Provider(spec) => {
            let backend = ctx
                .backends
                .endpoint(&spec.endpoint)
                .cloned()
                .ok_or_else(|| AdcsError::UnknownEndpoint {
                    node_id: node.id.to_string(),
                    endpoint: spec.endpoint.clone(),
                })?;

            ctx.emit(EventKind::ProviderCalled {
                node_id: Arc::clone(&node.id),
                endpoint: spec.endpoint.clone(),
                model: spec.model.clone(),
            });
            let output = ctx
                .external(
                    &node.id,
                    timeout,
                    invoke(&node.id, spec, node.output_format, backend.as_ref(), &ctx.input),
                )
                .await?;
            ctx.emit(EventKind::ProviderResponded {
                node_id: Arc::clone(&node.id),
                confidence: output.confidence,
                duration_ms: output.metadata.processing_time.as_millis() as u64,
            });
            Ok(output)
        }
        NodeKind::SingleInput(spec) => {
            let collected = collect_inputs(ctx, &node.id, upstream, false)?;
            apply_transform(ctx, &node.id, &spec.transform, collected, node.output_format, timeout).await
        }
        NodeKind::MultiInput(spec) => {
            let allow_partial = spec.transform.config.allow_partial;
            let collected = collect_inputs(ctx, &node.id, upstream, allow_partial)?;
            apply_transform(ctx, &node.id, &spec.transform, collected, node.output_format, timeout).await
        }
        NodeKind::Chained(spec) => run_chain(ctx, &node.id, spec, upstream, node.output_format, timeout).await,
    }
}
