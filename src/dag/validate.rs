//! Graph validation - everything checked before a graph may run
//!
//! Order of checks:
//! 1. non-empty, arity per variant, adaptor configs
//! 2. every input resolves (DanglingReference)
//! 3. acyclic, DFS three-color (CycleDetected with the id sequence)
//! 4. every edge's format is accepted by its consumer (TypeMismatch)
//! 5. every node can emit its declared format
//! 6. a single terminal node

use std::sync::Arc;

use super::graph::{AdaptorGraph, Adjacency};
use super::planner::topological_order;
use super::ValidatedGraph;
use crate::error::AdcsError;
use crate::format::{rule_for, OutputFormat};
use crate::node::{AggregationMethod, ChainSpec, Node, NodeKind, Transform};

/// Validate `graph` and freeze it for execution
pub fn validate(graph: AdaptorGraph) -> Result<ValidatedGraph, AdcsError> {
    if graph.is_empty() {
        return Err(AdcsError::EmptyGraph);
    }

    for node in graph.nodes() {
        check_shape(node)?;
    }

    let adjacency = graph.adjacency()?;
    detect_cycle(&graph, &adjacency)?;

    for node in graph.nodes() {
        check_formats(&graph, node)?;
    }

    let terminal = resolve_terminal(&graph, &adjacency)?;
    let order = topological_order(&adjacency).ok_or_else(|| AdcsError::Internal {
        reason: "acyclic graph failed to plan".to_string(),
    })?;

    Ok(ValidatedGraph {
        graph: Arc::new(graph),
        adjacency,
        order,
        terminal,
    })
}

/// DFS three-color cycle detection
///
/// A gray node reached again closes a cycle; the error lists the ids on the
/// current path from that node back to itself. The walk keeps its own frame
/// stack instead of recursing.
pub fn detect_cycle(graph: &AdaptorGraph, adjacency: &Adjacency) -> Result<(), AdcsError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut colors = vec![Color::White; adjacency.len()];
    // (node, index of the next successor to visit)
    let mut frames: Vec<(usize, usize)> = Vec::new();

    for start in 0..adjacency.len() {
        if colors[start] != Color::White {
            continue;
        }
        colors[start] = Color::Gray;
        frames.push((start, 0));

        while let Some(frame) = frames.last_mut() {
            let (node, cursor) = *frame;
            let Some(&next) = adjacency.successors[node].get(cursor) else {
                colors[node] = Color::Black;
                frames.pop();
                continue;
            };
            frame.1 += 1;

            match colors[next] {
                Color::Gray => {
                    let begin = frames.iter().position(|&(n, _)| n == next).unwrap_or(0);
                    let ids: Vec<&str> = frames[begin..]
                        .iter()
                        .map(|&(idx, _)| idx)
                        .chain(std::iter::once(next))
                        .map(|idx| graph.node(idx).id.as_ref())
                        .collect();
                    return Err(AdcsError::CycleDetected {
                        cycle: ids.join(" -> "),
                    });
                }
                Color::White => {
                    colors[next] = Color::Gray;
                    frames.push((next, 0));
                }
                Color::Black => {}
            }
        }
    }

    Ok(())
}

fn check_shape(node: &Node) -> Result<(), AdcsError> {
    if node.timeout_ms == Some(0) {
        return Err(AdcsError::InvalidConfig {
            node_id: node.id.to_string(),
            reason: "timeout_ms must be greater than zero".to_string(),
        });
    }

    let arity = |expected: &'static str, actual: usize| AdcsError::InvalidArity {
        node_id: node.id.to_string(),
        variant: node.kind.variant(),
        expected,
        actual,
    };

    match &node.kind {
        NodeKind::Provider(_) => Ok(()),
        NodeKind::SingleInput(spec) => {
            if spec.inputs.len() != 1 {
                return Err(arity("exactly 1 input", spec.inputs.len()));
            }
            check_transform(&node.id, &spec.transform, &spec.inputs, false)
        }
        NodeKind::MultiInput(spec) => {
            if spec.inputs.len() < 2 {
                return Err(arity("at least 2 inputs", spec.inputs.len()));
            }
            check_transform(&node.id, &spec.transform, &spec.inputs, true)
        }
        NodeKind::Chained(spec) => {
            if spec.links.is_empty() {
                return Err(arity("at least 1 link", 0));
            }
            let mut source: Arc<str> = Arc::clone(&spec.input);
            for link in &spec.links {
                check_transform(&node.id, &link.transform, std::slice::from_ref(&source), false)?;
                source = Arc::from(link.name.as_str());
            }
            Ok(())
        }
    }
}

fn check_transform(
    node_id: &str,
    transform: &Transform,
    inputs: &[Arc<str>],
    multi_input: bool,
) -> Result<(), AdcsError> {
    transform
        .config
        .validate(node_id, inputs, transform.core_model.is_some(), multi_input)
}

fn check_formats(graph: &AdaptorGraph, node: &Node) -> Result<(), AdcsError> {
    match &node.kind {
        NodeKind::Provider(_) => Ok(()),
        NodeKind::SingleInput(spec) | NodeKind::MultiInput(spec) => {
            let mut formats = Vec::with_capacity(spec.inputs.len());
            for input in &spec.inputs {
                let format = upstream_format(graph, node, input)?;
                if !spec.transform.accepts_format(format) {
                    return Err(type_mismatch(&node.id, input, format, &spec.transform));
                }
                formats.push(format);
            }
            check_emits(&node.id, &spec.transform, &formats, node.output_format)
        }
        NodeKind::Chained(spec) => check_chain(graph, node, spec),
    }
}

fn check_chain(graph: &AdaptorGraph, node: &Node, spec: &ChainSpec) -> Result<(), AdcsError> {
    let mut source: &str = &spec.input;
    let mut incoming = upstream_format(graph, node, &spec.input)?;

    for link in &spec.links {
        if let Some(wanted) = link.input_format {
            check_coercion(&node.id, source, incoming, wanted, link.transform.config.score_bands.is_some())?;
            incoming = wanted;
        }
        if !link.transform.accepts_format(incoming) {
            return Err(type_mismatch(&node.id, source, incoming, &link.transform));
        }
        check_emits(&node.id, &link.transform, &[incoming], link.output_format)?;
        source = &link.name;
        incoming = link.output_format;
    }

    let bands = spec
        .links
        .last()
        .is_some_and(|link| link.transform.config.score_bands.is_some());
    check_coercion(&node.id, source, incoming, node.output_format, bands)
}

fn upstream_format(graph: &AdaptorGraph, node: &Node, input: &str) -> Result<OutputFormat, AdcsError> {
    graph
        .get(input)
        .map(|upstream| upstream.output_format)
        .ok_or_else(|| AdcsError::DanglingReference {
            node_id: node.id.to_string(),
            missing: input.to_string(),
        })
}

/// A coercion pair must be in the conversion table (with bands when labelling)
fn check_coercion(
    node_id: &str,
    source_id: &str,
    from: OutputFormat,
    to: OutputFormat,
    has_bands: bool,
) -> Result<(), AdcsError> {
    match rule_for(from, to) {
        Some(rule) if rule.needs_bands() && !has_bands => Err(AdcsError::InvalidConfig {
            node_id: node_id.to_string(),
            reason: format!(
                "converting '{}' from {} to {} needs score_bands",
                source_id, from, to
            ),
        }),
        Some(_) => Ok(()),
        None => Err(AdcsError::TypeMismatch {
            node_id: node_id.to_string(),
            source_id: source_id.to_string(),
            format: from,
            accepted: to.to_string(),
        }),
    }
}

/// The method's result family must be renderable into the declared format
fn check_emits(
    node_id: &str,
    transform: &Transform,
    input_formats: &[OutputFormat],
    output: OutputFormat,
) -> Result<(), AdcsError> {
    use AggregationMethod::*;

    let method = transform.config.method;
    let cannot_emit = |family: &str| AdcsError::InvalidConfig {
        node_id: node_id.to_string(),
        reason: format!("{} produces a {}, cannot emit {}", method, family, output),
    };

    match method {
        Voting | WeightedVoting | Thresholding | LogicalAnd | LogicalOr | LogicalXor => {
            if !output.is_boolean() {
                return Err(cannot_emit("decision"));
            }
        }
        WeightedAverage => {
            if !output.is_numeric() {
                return Err(cannot_emit("score"));
            }
        }
        Concatenation => {
            if output != OutputFormat::Bytes {
                return Err(cannot_emit("text"));
            }
        }
        MaxConfidence | PriorityOrder | FirstValid => {
            let has_bands = transform.config.score_bands.is_some();
            for &format in input_formats {
                if let Some(rule) = rule_for(format, output) {
                    if rule.needs_bands() && !has_bands {
                        return Err(cannot_emit("selected Uint256 without score_bands"));
                    }
                } else {
                    return Err(cannot_emit(&format!("selected {}", format)));
                }
            }
        }
        LlmReasoning => {}
    }
    Ok(())
}

fn type_mismatch(node_id: &str, source_id: &str, format: OutputFormat, transform: &Transform) -> AdcsError {
    let accepted = transform
        .accepted_formats()
        .map(|formats| {
            formats
                .iter()
                .map(OutputFormat::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_else(|| "any".to_string());
    AdcsError::TypeMismatch {
        node_id: node_id.to_string(),
        source_id: source_id.to_string(),
        format,
        accepted,
    }
}

fn resolve_terminal(graph: &AdaptorGraph, adjacency: &Adjacency) -> Result<usize, AdcsError> {
    if let Some(id) = graph.terminal() {
        return graph.index_of(id).ok_or_else(|| AdcsError::DanglingReference {
            node_id: "terminal".to_string(),
            missing: id.to_string(),
        });
    }

    let sinks: Vec<usize> = adjacency.sinks().collect();
    match sinks.as_slice() {
        [only] => Ok(*only),
        _ => Err(AdcsError::AmbiguousTerminal {
            sinks: sinks
                .iter()
                .map(|&idx| graph.node(idx).id.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}
