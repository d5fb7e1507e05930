//! Aggregator - combines upstream outputs into one confidence-annotated value
//!
//! Contains:
//! - `methods`: the rule-based methods (voting ... logicalXor)
//! - `normalize`: min-max / max-abs rescaling, applied before weighting
//! - `conflict`: detection thresholds and the fallback policies
//!
//! Aggregation is pure: no I/O, no suspension. The only method needing an
//! external call (`llmReasoning`) is driven by the runtime.

mod conflict;
mod methods;
mod normalize;

pub use conflict::{highest_priority, most_confident, numeric_conflict, resolve, vote_conflict, Resolution};
pub use methods::{normalized_weights, LogicalOp};
pub use normalize::normalize;

use std::sync::Arc;

use crate::error::AdcsError;
use crate::format::{FormattedValue, Intermediate};
use crate::node::{AdaptorConfig, AggregationMethod};

/// One upstream output as seen by the aggregator
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedInput {
    pub source_id: Arc<str>,
    pub value: FormattedValue,
    pub confidence: f64,
}

impl WeightedInput {
    pub fn new(source_id: impl Into<Arc<str>>, value: FormattedValue, confidence: f64) -> Self {
        Self {
            source_id: source_id.into(),
            value,
            confidence,
        }
    }
}

/// Result of aggregation, before rendering into the output format
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedResult {
    pub value: Intermediate,
    pub confidence: f64,
    pub rationale: String,
    /// Present when the conflict resolver decided the value
    pub conflict: Option<Resolution>,
}

/// Combine `inputs` with the configured method
///
/// `inputs` are in declaration order; failed inputs have already been dropped
/// (or the adaptor failed) according to `allow_partial`.
pub fn aggregate(
    node_id: &str,
    inputs: &[WeightedInput],
    config: &AdaptorConfig,
) -> Result<AggregatedResult, AdcsError> {
    use AggregationMethod::*;

    if inputs.is_empty() {
        return Err(AdcsError::NoValidInputs {
            node_id: node_id.to_string(),
            reason: "no inputs produced a value".to_string(),
        });
    }

    match config.method {
        Voting => methods::vote(node_id, inputs, config, false),
        WeightedVoting => methods::vote(node_id, inputs, config, true),
        WeightedAverage => methods::weighted_average(node_id, inputs, config),
        Concatenation => Ok(methods::concatenate(inputs, config)),
        Thresholding => methods::threshold(node_id, inputs, config),
        MaxConfidence => methods::max_confidence(node_id, inputs),
        PriorityOrder => methods::priority_order(node_id, inputs, config),
        FirstValid => methods::first_valid(node_id, inputs, config),
        LogicalAnd => methods::logical(node_id, inputs, config, LogicalOp::And),
        LogicalOr => methods::logical(node_id, inputs, config, LogicalOp::Or),
        LogicalXor => methods::logical(node_id, inputs, config, LogicalOp::Xor),
        LlmReasoning => Err(AdcsError::Internal {
            reason: format!("'{}': llmReasoning is answered by the core model", node_id),
        }),
    }
}
