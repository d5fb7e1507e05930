//! Adaptor executor - upstream results in, one formatted output out
//!
//! Steps for every adaptor (and every chain link):
//! 1. apply the missing-input policy to the upstream results
//! 2. aggregate, or ask the core model when the method is `llmReasoning`
//! 3. ask the core model for a rationale when one is configured
//! 4. render the intermediate result into the declared format

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use super::context::NodeContext;
use crate::aggregate::{aggregate, WeightedInput};
use crate::error::{AdcsError, Result};
use crate::event::EventKind;
use crate::format::{render, Intermediate, OutputFormat};
use crate::node::{AggregationMethod, NodeOutput, Transform};
use crate::provider::{call_model, ModelInput, ModelResponse, Purpose, ReasoningRequest};
use crate::store::NodeStatus;

/// Upstream values that survived the missing-input policy
#[derive(Debug)]
pub(crate) struct CollectedInputs {
    pub inputs: Vec<WeightedInput>,
    /// `present / declared`; 1.0 when nothing was dropped
    pub degrade: f64,
}

/// Turn upstream results into aggregation inputs
///
/// A failed input is dropped when `allow_partial` is set, otherwise the
/// adaptor fails with `MissingRequiredInput` citing the upstream error.
pub(crate) fn collect_inputs(
    ctx: &NodeContext,
    node_id: &Arc<str>,
    upstream: &[(Arc<str>, NodeStatus)],
    allow_partial: bool,
) -> Result<CollectedInputs> {
    let mut inputs = Vec::with_capacity(upstream.len());

    for (input_id, status) in upstream {
        match status {
            NodeStatus::Completed(output) => inputs.push(WeightedInput::new(
                Arc::clone(input_id),
                output.value.clone(),
                output.confidence,
            )),
            NodeStatus::Failed(error) if allow_partial => {
                warn!(node_id = %node_id, input_id = %input_id, error = %error, "dropping failed input");
                ctx.emit(EventKind::InputDropped {
                    node_id: Arc::clone(node_id),
                    input_id: Arc::clone(input_id),
                    reason: error.to_string(),
                });
            }
            NodeStatus::Failed(error) => {
                return Err(AdcsError::MissingRequiredInput {
                    node_id: node_id.to_string(),
                    input_id: input_id.to_string(),
                    cause: Arc::clone(error),
                });
            }
        }
    }

    let degrade = if upstream.is_empty() {
        1.0
    } else {
        inputs.len() as f64 / upstream.len() as f64
    };
    Ok(CollectedInputs { inputs, degrade })
}

/// Run one transform over collected inputs
pub(crate) async fn apply_transform(
    ctx: &NodeContext,
    node_id: &Arc<str>,
    transform: &Transform,
    collected: CollectedInputs,
    format: OutputFormat,
    timeout: Duration,
) -> Result<NodeOutput> {
    let started = Instant::now();
    let config = &transform.config;
    let CollectedInputs { inputs, degrade } = collected;

    let (intermediate, confidence, rationale) = match (config.method, transform.core_model.as_deref()) {
        (AggregationMethod::LlmReasoning, Some(model)) => {
            let request = request(node_id, Purpose::Aggregate, transform, &inputs, format, None);
            let response = ask(ctx, node_id, model, request, timeout).await?;
            let confidence = response.confidence.unwrap_or_else(|| mean_confidence(&inputs));
            let value = response.value.unwrap_or_else(|| Value::String(response.text.clone()));
            (Intermediate::Structured(value), confidence, response.text)
        }
        (_, model) => {
            let result = aggregate(node_id, &inputs, config)?;
            if let Some(resolution) = &result.conflict {
                ctx.emit(EventKind::ConflictResolved {
                    node_id: Arc::clone(node_id),
                    policy: resolution.policy.as_str().to_string(),
                    chosen: resolution.chosen.clone(),
                });
            }

            let rationale = match model {
                Some(model) => {
                    let draft = result.rationale.clone();
                    let request = request(node_id, Purpose::Explain, transform, &inputs, format, Some(draft));
                    let response = ask(ctx, node_id, model, request, timeout).await?;
                    if response.text.trim().is_empty() {
                        result.rationale
                    } else {
                        response.text
                    }
                }
                None => result.rationale,
            };
            (result.value, result.confidence, rationale)
        }
    };

    let from = intermediate.kind();
    let answered = matches!(intermediate, Intermediate::Structured(_));
    let rendered = render(intermediate, &rationale, format, config.score_bands.as_ref()).map_err(|source| {
        // An undecodable model answer is a failed call, not a missing coercion path
        if answered {
            AdcsError::MalformedOutput {
                node_id: node_id.to_string(),
                reason: format!("core model answer: {}", source),
            }
        } else {
            AdcsError::Conversion {
                node_id: node_id.to_string(),
                source,
            }
        }
    })?;

    debug!(node_id = %node_id, from, to = %format, rule = rendered.rule, "rendered output");
    ctx.emit(EventKind::FormatConverted {
        node_id: Arc::clone(node_id),
        from: from.to_string(),
        to: format,
        rule: rendered.rule.to_string(),
    });

    Ok(NodeOutput::new(
        Arc::clone(node_id),
        rendered.value,
        confidence * degrade,
        transform.core_model.clone(),
        started.elapsed(),
    )
    .with_rationale(rationale))
}

fn request(
    node_id: &Arc<str>,
    purpose: Purpose,
    transform: &Transform,
    inputs: &[WeightedInput],
    output_format: OutputFormat,
    draft: Option<String>,
) -> ReasoningRequest {
    ReasoningRequest {
        node_id: Arc::clone(node_id),
        purpose,
        static_context: transform.static_context.clone(),
        inputs: inputs
            .iter()
            .map(|input| ModelInput {
                source_id: Arc::clone(&input.source_id),
                value: input.value.to_json(),
                confidence: input.confidence,
            })
            .collect(),
        output_format,
        draft,
    }
}

async fn ask(
    ctx: &NodeContext,
    node_id: &Arc<str>,
    model_name: &str,
    request: ReasoningRequest,
    timeout: Duration,
) -> Result<ModelResponse> {
    let model = ctx
        .backends
        .model(model_name)
        .cloned()
        .ok_or_else(|| AdcsError::UnknownModel {
            node_id: node_id.to_string(),
            model: model_name.to_string(),
        })?;

    ctx.emit(EventKind::ModelCalled {
        node_id: Arc::clone(node_id),
        model: model_name.to_string(),
        purpose: request.purpose.as_str().to_string(),
    });
    ctx.external(node_id, timeout, call_model(node_id, model_name, model.as_ref(), request))
        .await
}

fn mean_confidence(inputs: &[WeightedInput]) -> f64 {
    if inputs.is_empty() {
        return 0.0;
    }
    inputs.iter().map(|i| i.confidence).sum::<f64>() / inputs.len() as f64
}
