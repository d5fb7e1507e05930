//! Chain Runner - ordered links executed as one node
//!
//! `Pending -> Running(0) -> ... -> Running(n-1) -> Completed | Failed(i)`.
//! A link only hands over once it produced a value and the coercion into the
//! next link's input format succeeded. Any failure fails the whole chain.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::adaptor::{apply_transform, collect_inputs, CollectedInputs};
use super::context::NodeContext;
use crate::aggregate::WeightedInput;
use crate::error::{AdcsError, Result};
use crate::event::EventKind;
use crate::format::{convert, FormattedValue, OutputFormat, ScoreBands};
use crate::node::{ChainSpec, NodeOutput};
use crate::store::NodeStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Pending,
    Running(usize),
    Completed,
    Failed { index: usize },
}

impl ChainState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Running(i) => write!(f, "running({})", i),
            Self::Completed => f.write_str("completed"),
            Self::Failed { index } => write!(f, "failed({})", index),
        }
    }
}

struct ChainRun<'a> {
    ctx: &'a NodeContext,
    node_id: &'a Arc<str>,
    state: ChainState,
}

impl ChainRun<'_> {
    fn enter(&mut self, state: ChainState) {
        debug!(node_id = %self.node_id, from = %self.state, to = %state, "chain transition");
        self.state = state;
        self.ctx.emit(EventKind::ChainTransition {
            node_id: Arc::clone(self.node_id),
            state: state.to_string(),
        });
    }

    fn fail(&mut self, index: usize, link: &str, source: AdcsError) -> AdcsError {
        self.enter(ChainState::Failed { index });
        AdcsError::ChainLinkFailed {
            node_id: self.node_id.to_string(),
            link_index: index,
            link: link.to_string(),
            source: Box::new(source),
        }
    }
}

/// Run every link of `spec` over the upstream result
pub(crate) async fn run_chain(
    ctx: &NodeContext,
    node_id: &Arc<str>,
    spec: &ChainSpec,
    upstream: &[(Arc<str>, NodeStatus)],
    format: OutputFormat,
    timeout: Duration,
) -> Result<NodeOutput> {
    let started = Instant::now();
    let mut run = ChainRun {
        ctx,
        node_id,
        state: ChainState::Pending,
    };

    let Some(first) = spec.links.first() else {
        return Err(AdcsError::Internal {
            reason: format!("chain '{}' has no links", node_id),
        });
    };

    let collected = match collect_inputs(ctx, node_id, upstream, false) {
        Ok(collected) => collected,
        Err(e) => return Err(run.fail(0, &first.name, e)),
    };
    let mut inputs = collected.inputs;
    let mut degrade = collected.degrade;
    let mut last: Option<NodeOutput> = None;

    for (index, link) in spec.links.iter().enumerate() {
        run.enter(ChainState::Running(index));

        if let Some(expected) = link.input_format {
            let bands = link.transform.config.score_bands.as_ref();
            for input in &mut inputs {
                match coerce(ctx, node_id, input.value.clone(), expected, bands) {
                    Ok(value) => input.value = value,
                    Err(e) => return Err(run.fail(index, &link.name, e)),
                }
            }
        }

        let collected = CollectedInputs {
            inputs: std::mem::take(&mut inputs),
            degrade,
        };
        let output = apply_transform(ctx, node_id, &link.transform, collected, link.output_format, timeout)
            .await
            .map_err(|e| run.fail(index, &link.name, e))?;

        inputs = vec![WeightedInput::new(
            link.name.as_str(),
            output.value.clone(),
            output.confidence,
        )];
        degrade = 1.0;
        last = Some(output);
    }

    let last_index = spec.links.len() - 1;
    let last_link = &spec.links[last_index];
    let Some(output) = last else {
        return Err(AdcsError::Internal {
            reason: format!("chain '{}' produced no output", node_id),
        });
    };

    let bands = last_link.transform.config.score_bands.as_ref();
    let value = coerce(ctx, node_id, output.value, format, bands)
        .map_err(|e| run.fail(last_index, &last_link.name, e))?;

    run.enter(ChainState::Completed);
    let mut result = NodeOutput::new(
        Arc::clone(node_id),
        value,
        output.confidence,
        output.metadata.model,
        started.elapsed(),
    );
    result.rationale = output.rationale;
    Ok(result)
}

/// Convert between consecutive links; a no-op when the formats already match
fn coerce(
    ctx: &NodeContext,
    node_id: &Arc<str>,
    value: FormattedValue,
    to: OutputFormat,
    bands: Option<&ScoreBands>,
) -> Result<FormattedValue> {
    let from = value.format();
    if from == to {
        return Ok(value);
    }

    let (converted, rule) = convert(value, from, to, bands).map_err(|source| AdcsError::Conversion {
        node_id: node_id.to_string(),
        source,
    })?;
    ctx.emit(EventKind::FormatConverted {
        node_id: Arc::clone(node_id),
        from: from.to_string(),
        to,
        rule: rule.to_string(),
    });
    Ok(converted)
}
