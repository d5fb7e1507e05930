//! Adaptor configuration - every recognized option, enumerated and defaulted
//!
//! Validated once at graph construction (`AdaptorConfig::validate`); the
//! aggregator trusts a validated config and never re-interprets options.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::AdcsError;
use crate::format::{OutputFormat, ScoreBands};
use crate::util::DEFAULT_SEPARATOR;

const BOOLEAN_FORMATS: &[OutputFormat] = &[OutputFormat::Bool, OutputFormat::StringAndBool];
const NUMERIC_FORMATS: &[OutputFormat] = &[OutputFormat::Uint256, OutputFormat::StringAndUint256];
const THRESHOLD_FORMATS: &[OutputFormat] = &[
    OutputFormat::Bool,
    OutputFormat::StringAndBool,
    OutputFormat::Uint256,
    OutputFormat::StringAndUint256,
];

/// How an adaptor combines its inputs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregationMethod {
    Voting,
    WeightedVoting,
    WeightedAverage,
    Concatenation,
    Thresholding,
    MaxConfidence,
    PriorityOrder,
    #[default]
    FirstValid,
    LogicalAnd,
    LogicalOr,
    LogicalXor,
    LlmReasoning,
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Voting => "voting",
            Self::WeightedVoting => "weightedVoting",
            Self::WeightedAverage => "weightedAverage",
            Self::Concatenation => "concatenation",
            Self::Thresholding => "thresholding",
            Self::MaxConfidence => "maxConfidence",
            Self::PriorityOrder => "priorityOrder",
            Self::FirstValid => "firstValid",
            Self::LogicalAnd => "logicalAnd",
            Self::LogicalOr => "logicalOr",
            Self::LogicalXor => "logicalXor",
            Self::LlmReasoning => "llmReasoning",
        }
    }

    /// Formats the method can consume; `None` means any (opaque context)
    pub fn accepted_formats(&self) -> Option<&'static [OutputFormat]> {
        match self {
            Self::Voting | Self::WeightedVoting | Self::LogicalAnd | Self::LogicalOr | Self::LogicalXor => {
                Some(BOOLEAN_FORMATS)
            }
            Self::WeightedAverage => Some(NUMERIC_FORMATS),
            Self::Thresholding => Some(THRESHOLD_FORMATS),
            Self::Concatenation
            | Self::MaxConfidence
            | Self::PriorityOrder
            | Self::FirstValid
            | Self::LlmReasoning => None,
        }
    }
}

impl std::fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy applied when inputs disagree beyond the configured threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictPolicy {
    #[default]
    MaxConfidence,
    Priority,
    FallbackAverage,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxConfidence => "maxConfidence",
            Self::Priority => "priority",
            Self::FallbackAverage => "fallbackAverage",
        }
    }
}

/// When conflict resolution fires, and how it resolves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    /// Numeric inputs conflict when `max - min` exceeds this; `None` disables
    pub significant_difference: Option<f64>,
    /// Votes conflict when `|true - false| / total` is at or below this
    pub margin: f64,
    pub policy: ConflictPolicy,
}

/// Rescaling applied to numeric inputs before weighting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NormalizationMethod {
    /// `(v - min) / (max - min)`; a zero range maps every input to 1.0
    #[default]
    MinMax,
    /// `v / max|v|`; all-zero inputs map to 1.0
    MaxAbs,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    pub enabled: bool,
    pub method: NormalizationMethod,
}

/// The closed option set of an adaptor (or chain link)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptorConfig {
    pub method: AggregationMethod,
    /// Required by `thresholding`
    pub threshold: Option<f64>,
    /// source id -> non-negative weight; unlisted sources weigh 1.0
    pub weights: FxHashMap<String, f64>,
    pub separator: String,
    /// Source ids, most trusted first
    pub priority: Vec<String>,
    /// Minimum confidence for `firstValid`
    pub validity_floor: f64,
    pub conflict: ConflictConfig,
    pub normalization: NormalizationConfig,
    /// Proceed with degraded confidence when an input failed
    pub allow_partial: bool,
    pub score_bands: Option<ScoreBands>,
}

impl Default for AdaptorConfig {
    fn default() -> Self {
        Self {
            method: AggregationMethod::default(),
            threshold: None,
            weights: FxHashMap::default(),
            separator: DEFAULT_SEPARATOR.to_string(),
            priority: Vec::new(),
            validity_floor: 0.0,
            conflict: ConflictConfig::default(),
            normalization: NormalizationConfig::default(),
            allow_partial: false,
            score_bands: None,
        }
    }
}

impl AdaptorConfig {
    pub fn new(method: AggregationMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn with_weight(mut self, source: impl Into<String>, weight: f64) -> Self {
        self.weights.insert(source.into(), weight);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_priority<I, S>(mut self, priority: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = priority.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_conflict(mut self, conflict: ConflictConfig) -> Self {
        self.conflict = conflict;
        self
    }

    pub fn with_normalization(mut self, method: NormalizationMethod) -> Self {
        self.normalization = NormalizationConfig {
            enabled: true,
            method,
        };
        self
    }

    pub fn with_score_bands(mut self, bands: ScoreBands) -> Self {
        self.score_bands = Some(bands);
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_validity_floor(mut self, floor: f64) -> Self {
        self.validity_floor = floor;
        self
    }

    pub fn allowing_partial(mut self) -> Self {
        self.allow_partial = true;
        self
    }

    /// Weight configured for a source (1.0 when unlisted)
    pub fn weight_of(&self, source: &str) -> f64 {
        self.weights.get(source).copied().unwrap_or(1.0)
    }

    /// Position of a source in the priority list
    pub fn priority_rank(&self, source: &str) -> Option<usize> {
        self.priority.iter().position(|p| p == source)
    }

    /// Check every option against the node it configures
    ///
    /// `inputs` are the source ids the adaptor will see; `multi_input`
    /// gates `allow_partial`.
    pub fn validate(
        &self,
        node_id: &str,
        inputs: &[Arc<str>],
        has_core_model: bool,
        multi_input: bool,
    ) -> Result<(), AdcsError> {
        let invalid = |reason: String| AdcsError::InvalidConfig {
            node_id: node_id.to_string(),
            reason,
        };
        let is_input = |id: &str| inputs.iter().any(|i| i.as_ref() == id);

        for (source, weight) in &self.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(invalid(format!(
                    "weight for '{}' must be finite and non-negative, got {}",
                    source, weight
                )));
            }
            if !is_input(source) {
                return Err(invalid(format!(
                    "weight key '{}' is not a declared input",
                    source
                )));
            }
        }

        if let Some(threshold) = self.threshold {
            if !threshold.is_finite() {
                return Err(invalid(format!("threshold must be finite, got {}", threshold)));
            }
        } else if self.method == AggregationMethod::Thresholding {
            return Err(invalid("thresholding requires 'threshold'".to_string()));
        }

        let needs_priority = self.method == AggregationMethod::PriorityOrder
            || self.conflict.policy == ConflictPolicy::Priority;
        if needs_priority && self.priority.is_empty() {
            return Err(invalid("priority list is empty".to_string()));
        }
        for source in &self.priority {
            if !is_input(source) {
                return Err(invalid(format!(
                    "priority entry '{}' is not a declared input",
                    source
                )));
            }
        }

        if self.method == AggregationMethod::LlmReasoning && !has_core_model {
            return Err(invalid("llmReasoning requires a core model".to_string()));
        }

        if !(0.0..=1.0).contains(&self.validity_floor) {
            return Err(invalid(format!(
                "validity_floor must be in [0, 1], got {}",
                self.validity_floor
            )));
        }

        if let Some(diff) = self.conflict.significant_difference {
            if !diff.is_finite() || diff < 0.0 {
                return Err(invalid(format!(
                    "significant_difference must be finite and non-negative, got {}",
                    diff
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.conflict.margin) {
            return Err(invalid(format!(
                "conflict margin must be in [0, 1], got {}",
                self.conflict.margin
            )));
        }

        if let Some(bands) = self.score_bands {
            if bands.low > bands.medium {
                return Err(invalid(format!(
                    "score bands out of order: low {} > medium {}",
                    bands.low, bands.medium
                )));
            }
        }

        if self.allow_partial && !multi_input {
            return Err(invalid(
                "allow_partial is only meaningful on multi-input adaptors".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(ids: &[&str]) -> Vec<Arc<str>> {
        ids.iter().map(|s| Arc::from(*s)).collect()
    }

    #[test]
    fn default_config_is_valid_first_valid() {
        let config = AdaptorConfig::default();
        assert_eq!(config.method, AggregationMethod::FirstValid);
        assert_eq!(config.separator, ", ");
        assert!(config.validate("a", &inputs(&["p"]), false, false).is_ok());
    }

    #[test]
    fn weight_keys_must_be_inputs() {
        let config = AdaptorConfig::new(AggregationMethod::WeightedAverage).with_weight("ghost", 1.0);
        let err = config
            .validate("agg", &inputs(&["a", "b"]), false, true)
            .unwrap_err();
        assert_eq!(err.code(), "ADCS-015");
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn negative_weight_rejected() {
        let config = AdaptorConfig::new(AggregationMethod::WeightedAverage).with_weight("a", -0.1);
        assert!(config.validate("agg", &inputs(&["a", "b"]), false, true).is_err());
    }

    #[test]
    fn thresholding_needs_threshold() {
        let config = AdaptorConfig::new(AggregationMethod::Thresholding);
        assert!(config.validate("t", &inputs(&["a"]), false, false).is_err());
        let config = config.with_threshold(50.0);
        assert!(config.validate("t", &inputs(&["a"]), false, false).is_ok());
    }

    #[test]
    fn priority_policy_needs_list_of_inputs() {
        let config = AdaptorConfig::new(AggregationMethod::WeightedAverage).with_conflict(ConflictConfig {
            significant_difference: Some(10.0),
            margin: 0.0,
            policy: ConflictPolicy::Priority,
        });
        assert!(config.validate("c", &inputs(&["a", "b"]), false, true).is_err());

        let config = config.with_priority(["b", "a"]);
        assert!(config.validate("c", &inputs(&["a", "b"]), false, true).is_ok());

        let config = config.with_priority(["z"]);
        assert!(config.validate("c", &inputs(&["a", "b"]), false, true).is_err());
    }

    #[test]
    fn llm_reasoning_needs_model() {
        let config = AdaptorConfig::new(AggregationMethod::LlmReasoning);
        assert!(config.validate("l", &inputs(&["a"]), false, false).is_err());
        assert!(config.validate("l", &inputs(&["a"]), true, false).is_ok());
    }

    #[test]
    fn allow_partial_only_on_multi_input() {
        let config = AdaptorConfig::default().allowing_partial();
        assert!(config.validate("s", &inputs(&["a"]), false, false).is_err());
        assert!(config.validate("m", &inputs(&["a", "b"]), false, true).is_ok());
    }

    #[test]
    fn bands_must_be_ordered() {
        let config = AdaptorConfig::default().with_score_bands(ScoreBands::new(60, 30));
        assert!(config.validate("s", &inputs(&["a"]), false, false).is_err());
    }

    #[test]
    fn deserializes_from_camel_case_method_names() {
        let config: AdaptorConfig = serde_json::from_value(serde_json::json!({
            "method": "weightedAverage",
            "weights": {"financial": 0.5, "news": 0.3},
            "conflict": {"significant_difference": 40.0, "policy": "fallbackAverage"},
            "score_bands": {"low": 30, "medium": 60}
        }))
        .unwrap();
        assert_eq!(config.method, AggregationMethod::WeightedAverage);
        assert_eq!(config.weight_of("financial"), 0.5);
        assert_eq!(config.weight_of("market"), 1.0);
        assert_eq!(config.conflict.policy, ConflictPolicy::FallbackAverage);
        assert_eq!(config.separator, ", ");
    }

    #[test]
    fn method_acceptance_sets() {
        assert_eq!(
            AggregationMethod::WeightedVoting.accepted_formats(),
            Some(BOOLEAN_FORMATS)
        );
        assert!(AggregationMethod::LlmReasoning.accepted_formats().is_none());
        assert!(AggregationMethod::Thresholding
            .accepted_formats()
            .unwrap()
            .contains(&OutputFormat::Uint256));
    }
}
