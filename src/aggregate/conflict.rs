//! Conflict Resolver - fallback path when inputs disagree
//!
//! Detection is method-specific (numeric spread vs vote margin); resolution
//! is shared and works on the numeric view of the inputs, where decisions are
//! 1.0 / 0.0.

use std::sync::Arc;

use super::WeightedInput;
use crate::node::{AdaptorConfig, ConflictConfig, ConflictPolicy};

/// How a conflict was settled
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub policy: ConflictPolicy,
    /// Numeric view of the resolved value
    pub value: f64,
    pub confidence: f64,
    /// Input picked by a selecting policy; `None` for `fallbackAverage`
    pub chosen: Option<Arc<str>>,
}

/// Spread of numeric inputs when it exceeds `significant_difference`
pub fn numeric_conflict(values: &[f64], config: &ConflictConfig) -> Option<f64> {
    let threshold = config.significant_difference?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;
    (spread > threshold).then_some(spread)
}

/// Normalized vote margin when it is at or below `margin`
///
/// `yes + no` must be positive.
pub fn vote_conflict(yes: f64, no: f64, config: &ConflictConfig) -> Option<f64> {
    let margin = (yes - no).abs() / (yes + no);
    (margin <= config.margin).then_some(margin)
}

/// Apply the configured policy
///
/// `values[i]` is the numeric view of `inputs[i]`. Returns `None` when the
/// `priority` policy finds none of its sources among the inputs.
pub fn resolve(inputs: &[WeightedInput], values: &[f64], config: &AdaptorConfig) -> Option<Resolution> {
    let policy = config.conflict.policy;
    match policy {
        ConflictPolicy::MaxConfidence => {
            let idx = most_confident(inputs)?;
            Some(pick(policy, inputs, values, idx))
        }
        ConflictPolicy::Priority => {
            let idx = highest_priority(inputs, config)?;
            Some(pick(policy, inputs, values, idx))
        }
        ConflictPolicy::FallbackAverage => {
            if values.is_empty() {
                return None;
            }
            let n = values.len() as f64;
            Some(Resolution {
                policy,
                value: values.iter().sum::<f64>() / n,
                confidence: inputs.iter().map(|i| i.confidence).sum::<f64>() / n,
                chosen: None,
            })
        }
    }
}

/// Index of the highest-confidence input; ties go to the earliest declared
pub fn most_confident(inputs: &[WeightedInput]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (idx, input) in inputs.iter().enumerate() {
        match best {
            Some(b) if inputs[b].confidence >= input.confidence => {}
            _ => best = Some(idx),
        }
    }
    best
}

/// Index of the input whose source appears earliest in the priority list
pub fn highest_priority(inputs: &[WeightedInput], config: &AdaptorConfig) -> Option<usize> {
    inputs
        .iter()
        .enumerate()
        .filter_map(|(idx, input)| config.priority_rank(&input.source_id).map(|rank| (rank, idx)))
        .min()
        .map(|(_, idx)| idx)
}

fn pick(policy: ConflictPolicy, inputs: &[WeightedInput], values: &[f64], idx: usize) -> Resolution {
    Resolution {
        policy,
        value: values[idx],
        confidence: inputs[idx].confidence,
        chosen: Some(Arc::clone(&inputs[idx].source_id)),
    }
}
