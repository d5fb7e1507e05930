//! Rule-based aggregation methods
//!
//! Every method returns an `AggregatedResult` whose rationale names the method
//! and the inputs that decided it. `llmReasoning` is not here: it needs the
//! core model and is driven by the adaptor executor.

use super::conflict::{self, Resolution};
use super::normalize::normalize;
use super::{AggregatedResult, WeightedInput};
use crate::error::AdcsError;
use crate::format::{FormattedValue, Intermediate};
use crate::node::{AdaptorConfig, AggregationMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Xor,
}

/// `voting` (1 per vote) and `weightedVoting` (normalized weight × confidence)
pub fn vote(
    node_id: &str,
    inputs: &[WeightedInput],
    config: &AdaptorConfig,
    weighted: bool,
) -> Result<AggregatedResult, AdcsError> {
    let method = config.method;
    let decisions = decisions(node_id, inputs, method)?;
    let weights = if weighted {
        normalized_weights(node_id, inputs, config)?
    } else {
        vec![1.0; inputs.len()]
    };

    let (mut yes, mut no) = (0.0_f64, 0.0_f64);
    for ((input, &decision), &weight) in inputs.iter().zip(&decisions).zip(&weights) {
        let vote = if weighted { weight * input.confidence } else { weight };
        if decision {
            yes += vote;
        } else {
            no += vote;
        }
    }

    let total = yes + no;
    if total <= 0.0 {
        return Err(no_valid(node_id, format!("{} has no voting weight", method)));
    }

    let tally = format!("{}: true {:.2} vs false {:.2}", method, yes, no);
    let as_numbers: Vec<f64> = decisions.iter().map(|&d| if d { 1.0 } else { 0.0 }).collect();

    if let Some(margin) = conflict::vote_conflict(yes, no, &config.conflict) {
        let resolution = resolve(node_id, inputs, &as_numbers, config)?;
        let rationale = format!(
            "{} (margin {:.2} <= {:.2}); {}",
            tally,
            margin,
            config.conflict.margin,
            describe(&resolution)
        );
        return Ok(AggregatedResult {
            value: Intermediate::Decision(resolution.value > 0.5),
            confidence: resolution.confidence,
            rationale,
            conflict: Some(resolution),
        });
    }

    Ok(AggregatedResult {
        value: Intermediate::Decision(yes > no),
        confidence: yes.max(no) / total,
        rationale: tally,
        conflict: None,
    })
}

/// Σ(v·w·c) / Σ(w·c) over (optionally normalized) numeric inputs
pub fn weighted_average(
    node_id: &str,
    inputs: &[WeightedInput],
    config: &AdaptorConfig,
) -> Result<AggregatedResult, AdcsError> {
    let raw = raw_numbers(node_id, inputs, config)?;
    let values = rescaled(&raw, config);
    let weights = normalized_weights(node_id, inputs, config)?;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for ((input, &value), &weight) in inputs.iter().zip(&values).zip(&weights) {
        numerator += value * weight * input.confidence;
        denominator += weight * input.confidence;
    }
    if denominator <= 0.0 {
        return Err(no_valid(
            node_id,
            "weightedAverage denominator is zero (all weights or confidences are zero)".to_string(),
        ));
    }

    let listed = list_values(inputs, &raw);

    // Spread is measured on the input scale; normalization only shapes the weighting
    if let Some(spread) = conflict::numeric_conflict(&raw, &config.conflict) {
        let resolution = resolve(node_id, inputs, &raw, config)?;
        let rationale = format!(
            "weightedAverage of {}: spread {:.2} > {:.2}; {}",
            listed,
            spread,
            config.conflict.significant_difference.unwrap_or_default(),
            describe(&resolution)
        );
        return Ok(AggregatedResult {
            value: Intermediate::Score(resolution.value),
            confidence: resolution.confidence,
            rationale,
            conflict: Some(resolution),
        });
    }

    let score = numerator / denominator;
    Ok(AggregatedResult {
        value: Intermediate::Score(score),
        confidence: denominator,
        rationale: format!("weightedAverage of {} = {:.2}", listed, score),
        conflict: None,
    })
}

/// Weighted sum of the numeric view compared against `threshold`
pub fn threshold(
    node_id: &str,
    inputs: &[WeightedInput],
    config: &AdaptorConfig,
) -> Result<AggregatedResult, AdcsError> {
    let threshold = config.threshold.ok_or_else(|| AdcsError::InvalidConfig {
        node_id: node_id.to_string(),
        reason: "thresholding requires 'threshold'".to_string(),
    })?;
    let values = numbers(node_id, inputs, config)?;
    let weights = normalized_weights(node_id, inputs, config)?;

    let sum: f64 = values.iter().zip(&weights).map(|(v, w)| v * w).sum();
    let confidence: f64 = inputs.iter().zip(&weights).map(|(i, w)| i.confidence * w).sum();
    let passed = sum >= threshold;

    Ok(AggregatedResult {
        value: Intermediate::Decision(passed),
        confidence,
        rationale: format!(
            "thresholding: weighted sum {:.2} {} {:.2}",
            sum,
            if passed { ">=" } else { "<" },
            threshold
        ),
        conflict: None,
    })
}

/// Inputs' text joined with the separator, in declaration order
pub fn concatenate(inputs: &[WeightedInput], config: &AdaptorConfig) -> AggregatedResult {
    let text = inputs
        .iter()
        .map(|input| input.value.to_text())
        .collect::<Vec<_>>()
        .join(&config.separator);
    let confidence = inputs.iter().map(|i| i.confidence).sum::<f64>() / inputs.len() as f64;

    AggregatedResult {
        value: Intermediate::Text(text),
        confidence,
        rationale: format!("concatenation of {} inputs", inputs.len()),
        conflict: None,
    }
}

pub fn max_confidence(node_id: &str, inputs: &[WeightedInput]) -> Result<AggregatedResult, AdcsError> {
    let idx = conflict::most_confident(inputs)
        .ok_or_else(|| no_valid(node_id, "maxConfidence has no inputs".to_string()))?;
    Ok(selected(
        &inputs[idx],
        format!("maxConfidence: picked '{}' ({:.2})", inputs[idx].source_id, inputs[idx].confidence),
    ))
}

pub fn priority_order(
    node_id: &str,
    inputs: &[WeightedInput],
    config: &AdaptorConfig,
) -> Result<AggregatedResult, AdcsError> {
    let idx = conflict::highest_priority(inputs, config)
        .ok_or_else(|| no_valid(node_id, "no input from the priority list is available".to_string()))?;
    let rank = config.priority_rank(&inputs[idx].source_id).unwrap_or_default();
    Ok(selected(
        &inputs[idx],
        format!("priorityOrder: picked '{}' (rank {})", inputs[idx].source_id, rank + 1),
    ))
}

/// First input, in declaration order, with a value and confidence >= floor
pub fn first_valid(
    node_id: &str,
    inputs: &[WeightedInput],
    config: &AdaptorConfig,
) -> Result<AggregatedResult, AdcsError> {
    let input = inputs
        .iter()
        .find(|input| !is_null(&input.value) && input.confidence >= config.validity_floor)
        .ok_or_else(|| {
            no_valid(
                node_id,
                format!("no input reaches validity floor {:.2}", config.validity_floor),
            )
        })?;
    Ok(selected(input, format!("firstValid: picked '{}'", input.source_id)))
}

/// AND / OR / XOR over decisions
///
/// Confidence is the weakest input for AND and XOR, the strongest for OR.
pub fn logical(
    node_id: &str,
    inputs: &[WeightedInput],
    config: &AdaptorConfig,
    op: LogicalOp,
) -> Result<AggregatedResult, AdcsError> {
    let decisions = decisions(node_id, inputs, config.method)?;
    let confidences = inputs.iter().map(|i| i.confidence);

    let (decision, confidence) = match op {
        LogicalOp::And => (decisions.iter().all(|&d| d), confidences.fold(1.0, f64::min)),
        LogicalOp::Or => (decisions.iter().any(|&d| d), confidences.fold(0.0, f64::max)),
        LogicalOp::Xor => (
            decisions.iter().filter(|&&d| d).count() % 2 == 1,
            confidences.fold(1.0, f64::min),
        ),
    };
    let trues = decisions.iter().filter(|&&d| d).count();

    Ok(AggregatedResult {
        value: Intermediate::Decision(decision),
        confidence,
        rationale: format!(
            "{}: {} of {} inputs true -> {}",
            config.method,
            trues,
            decisions.len(),
            decision
        ),
        conflict: None,
    })
}

fn selected(input: &WeightedInput, rationale: String) -> AggregatedResult {
    AggregatedResult {
        value: Intermediate::Selected(input.value.clone()),
        confidence: input.confidence,
        rationale,
        conflict: None,
    }
}

fn resolve(
    node_id: &str,
    inputs: &[WeightedInput],
    values: &[f64],
    config: &AdaptorConfig,
) -> Result<Resolution, AdcsError> {
    let resolution = conflict::resolve(inputs, values, config).ok_or_else(|| {
        no_valid(
            node_id,
            format!("conflict policy {} found no eligible input", config.conflict.policy.as_str()),
        )
    })?;
    tracing::warn!(
        node_id = %node_id,
        policy = resolution.policy.as_str(),
        chosen = resolution.chosen.as_deref().unwrap_or("-"),
        "inputs in conflict, applying fallback policy"
    );
    Ok(resolution)
}

fn describe(resolution: &Resolution) -> String {
    match &resolution.chosen {
        Some(source) => format!("conflict resolved by {}: picked '{}'", resolution.policy.as_str(), source),
        None => format!(
            "conflict resolved by {}: {:.2}",
            resolution.policy.as_str(),
            resolution.value
        ),
    }
}

fn decisions(node_id: &str, inputs: &[WeightedInput], method: AggregationMethod) -> Result<Vec<bool>, AdcsError> {
    inputs
        .iter()
        .map(|input| {
            input
                .value
                .as_bool()
                .ok_or_else(|| unexpected(node_id, input, method, "a decision"))
        })
        .collect()
}

/// Numeric view, normalized first when enabled
fn numbers(node_id: &str, inputs: &[WeightedInput], config: &AdaptorConfig) -> Result<Vec<f64>, AdcsError> {
    let raw = raw_numbers(node_id, inputs, config)?;
    Ok(rescaled(&raw, config))
}

fn raw_numbers(node_id: &str, inputs: &[WeightedInput], config: &AdaptorConfig) -> Result<Vec<f64>, AdcsError> {
    inputs
        .iter()
        .map(|input| {
            input
                .value
                .as_number()
                .ok_or_else(|| unexpected(node_id, input, config.method, "a number"))
        })
        .collect()
}

fn rescaled(raw: &[f64], config: &AdaptorConfig) -> Vec<f64> {
    let mut values = raw.to_vec();
    if config.normalization.enabled {
        normalize(&mut values, config.normalization.method);
    }
    values
}

/// Weights of the present inputs, rescaled to sum to 1
pub fn normalized_weights(
    node_id: &str,
    inputs: &[WeightedInput],
    config: &AdaptorConfig,
) -> Result<Vec<f64>, AdcsError> {
    let raw: Vec<f64> = inputs.iter().map(|i| config.weight_of(&i.source_id)).collect();
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return Err(no_valid(node_id, "all input weights are zero".to_string()));
    }
    Ok(raw.into_iter().map(|w| w / total).collect())
}

fn list_values(inputs: &[WeightedInput], values: &[f64]) -> String {
    inputs
        .iter()
        .zip(values)
        .map(|(input, value)| format!("{}={}", input.source_id, value))
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_null(value: &FormattedValue) -> bool {
    match value {
        FormattedValue::Bytes(bytes) => bytes.is_empty(),
        _ => false,
    }
}

fn no_valid(node_id: &str, reason: String) -> AdcsError {
    AdcsError::NoValidInputs {
        node_id: node_id.to_string(),
        reason,
    }
}

fn unexpected(
    node_id: &str,
    input: &WeightedInput,
    method: AggregationMethod,
    expected: &'static str,
) -> AdcsError {
    AdcsError::UnexpectedInput {
        node_id: node_id.to_string(),
        source_id: input.source_id.to_string(),
        method: method.as_str(),
        expected,
        actual: input.value.format(),
    }
}
