//! Provider Invoker - one external call, decoded into the declared format
//!
//! Exactly one call per invocation; failures surface as node-invocation
//! errors and are never retried here.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::debug;

use super::{CoreModel, InferenceBackend, ModelResponse, ReasoningRequest};
use crate::error::AdcsError;
use crate::format::{FormattedValue, OutputFormat};
use crate::node::{NodeOutput, ProviderSpec};

/// Call `backend` once and decode its result as `format`
pub async fn invoke(
    node_id: &Arc<str>,
    spec: &ProviderSpec,
    format: OutputFormat,
    backend: &dyn InferenceBackend,
    input: &Value,
) -> Result<NodeOutput, AdcsError> {
    debug!(node_id = %node_id, endpoint = %spec.endpoint, backend = backend.name(), "calling provider");
    let started = Instant::now();

    let output = backend
        .process(&spec.model, input)
        .await
        .map_err(|e| AdcsError::ProviderFailed {
            node_id: node_id.to_string(),
            endpoint: spec.endpoint.clone(),
            reason: format!("{:#}", e),
        })?;

    check_confidence(node_id, output.confidence)?;
    let value = FormattedValue::from_json(&output.result, format).map_err(|e| AdcsError::MalformedOutput {
        node_id: node_id.to_string(),
        reason: e.to_string(),
    })?;

    let mut node_output = NodeOutput::new(
        Arc::clone(node_id),
        value,
        output.confidence,
        Some(output.metadata.model),
        started.elapsed(),
    );
    node_output.metadata.timestamp = output.metadata.timestamp;
    Ok(node_output)
}

/// Ask `model` and check the confidence it reports
pub async fn call_model(
    node_id: &str,
    model_name: &str,
    model: &dyn CoreModel,
    request: ReasoningRequest,
) -> Result<ModelResponse, AdcsError> {
    debug!(node_id = %node_id, model = %model_name, purpose = ?request.purpose, "calling core model");

    let response = model.reason(request).await.map_err(|e| AdcsError::ModelFailed {
        node_id: node_id.to_string(),
        model: model_name.to_string(),
        reason: format!("{:#}", e),
    })?;

    if let Some(confidence) = response.confidence {
        check_confidence(node_id, confidence)?;
    }
    Ok(response)
}

fn check_confidence(node_id: &str, confidence: f64) -> Result<(), AdcsError> {
    if confidence.is_finite() && (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        Err(AdcsError::MalformedOutput {
            node_id: node_id.to_string(),
            reason: format!("confidence {} is outside [0, 1]", confidence),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockBackend, MockModel, Purpose};
    use serde_json::json;

    fn spec() -> ProviderSpec {
        ProviderSpec {
            endpoint: "oracle".into(),
            model: "credit-v3".into(),
        }
    }

    #[tokio::test]
    async fn decodes_into_declared_format() {
        let backend = MockBackend::returning(json!({"text": "solvent", "value": true}), 0.8);
        let out = invoke(&Arc::from("p"), &spec(), OutputFormat::StringAndBool, &backend, &json!({}))
            .await
            .unwrap();
        assert_eq!(out.value, FormattedValue::StringAndBool("solvent".into(), true));
        assert_eq!(out.confidence, 0.8);
        assert_eq!(out.metadata.model.as_deref(), Some("credit-v3"));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn backend_failure_is_provider_error() {
        let backend = MockBackend::failing("connection refused");
        let err = invoke(&Arc::from("p"), &spec(), OutputFormat::Bool, &backend, &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ADCS-030");
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn undecodable_result_is_malformed() {
        let backend = MockBackend::returning(json!("maybe"), 0.8);
        let err = invoke(&Arc::from("p"), &spec(), OutputFormat::Bool, &backend, &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "ADCS-033");
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_malformed() {
        let backend = MockBackend::returning(json!(true), 1.5);
        let err = invoke(&Arc::from("p"), &spec(), OutputFormat::Bool, &backend, &json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("outside [0, 1]"));
    }

    #[tokio::test]
    async fn model_failure_is_model_error() {
        let model = MockModel::failing("quota exceeded");
        let request = ReasoningRequest {
            node_id: Arc::from("a"),
            purpose: Purpose::Explain,
            static_context: String::new(),
            inputs: vec![],
            output_format: OutputFormat::Bool,
            draft: None,
        };
        let err = call_model("a", "explainer", &model, request).await.unwrap_err();
        assert_eq!(err.code(), "ADCS-031");
    }
}
