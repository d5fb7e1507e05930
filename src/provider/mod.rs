//! Provider abstraction layer
//!
//! Two external boundaries, both opaque to the engine:
//!
//! | Trait | Used by | Contract |
//! |-------|---------|----------|
//! | [`InferenceBackend`] | Provider nodes | `process(model, input) -> ProviderOutput` |
//! | [`CoreModel`] | Adaptors / chain links with a core model | `reason(request) -> ModelResponse` |
//!
//! Backends are looked up by name in [`Backends`]; nothing here knows about
//! transports. The engine never retries a call.
//!
//! - [`invoker`] - single call + output decoding
//! - [`mock`] - deterministic backends for tests and demos

pub mod invoker;
pub mod mock;
mod registry;

pub use invoker::{call_model, invoke};
pub use mock::{MockBackend, MockModel};
pub use registry::Backends;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::format::OutputFormat;

/// Metadata every inference source reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub model: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "processingTime", with = "millis")]
    pub processing_time: Duration,
}

/// The single contract every external inference source satisfies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutput {
    /// Unstructured result, decoded into the provider node's declared format
    pub result: Value,
    /// Must be within [0.0, 1.0]
    pub confidence: f64,
    pub metadata: ProviderMetadata,
}

impl ProviderOutput {
    pub fn new(result: Value, confidence: f64, model: impl Into<String>) -> Self {
        Self {
            result,
            confidence,
            metadata: ProviderMetadata {
                model: model.into(),
                timestamp: Utc::now(),
                processing_time: Duration::ZERO,
            },
        }
    }
}

/// External inference source behind a provider node
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run one inference for `input` with `model`
    async fn process(&self, model: &str, input: &Value) -> anyhow::Result<ProviderOutput>;

    /// Backend name used in logs
    fn name(&self) -> &str;
}

/// Why the core model is being asked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// `llmReasoning`: the answer is the adaptor's value
    Aggregate,
    /// Rule-based result already computed; produce the rationale text
    Explain,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aggregate => "aggregate",
            Self::Explain => "explain",
        }
    }
}

/// One upstream value handed to the core model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInput {
    pub source_id: Arc<str>,
    pub value: Value,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReasoningRequest {
    pub node_id: Arc<str>,
    pub purpose: Purpose,
    pub static_context: String,
    pub inputs: Vec<ModelInput>,
    /// Format the answer will be rendered into
    pub output_format: OutputFormat,
    /// Mechanical rationale of the rule-based result (`Explain` only)
    pub draft: Option<String>,
}

/// Core model answer: text plus an optional structured value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub text: String,
    #[serde(default)]
    pub value: Option<Value>,
    /// Defaults to the mean input confidence when absent
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl ModelResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: None,
            confidence: None,
        }
    }

    pub fn structured(text: impl Into<String>, value: Value, confidence: f64) -> Self {
        Self {
            text: text.into(),
            value: Some(value),
            confidence: Some(confidence),
        }
    }
}

/// Reasoning model applied by adaptors
#[async_trait]
pub trait CoreModel: Send + Sync {
    async fn reason(&self, request: ReasoningRequest) -> anyhow::Result<ModelResponse>;

    fn name(&self) -> &str;
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
