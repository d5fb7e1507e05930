//! Output produced by any node

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::format::FormattedValue;

/// Where and when an output was produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputMetadata {
    /// Provider model or adaptor core model
    pub model: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(with = "duration_ms")]
    pub processing_time: Duration,
}

/// Confidence-annotated value in the node's declared format
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeOutput {
    pub node_id: Arc<str>,
    pub value: FormattedValue,
    /// Always within [0.0, 1.0]
    pub confidence: f64,
    pub rationale: Option<String>,
    pub metadata: OutputMetadata,
}

impl NodeOutput {
    pub fn new(
        node_id: Arc<str>,
        value: FormattedValue,
        confidence: f64,
        model: Option<String>,
        processing_time: Duration,
    ) -> Self {
        Self {
            node_id,
            value,
            confidence: confidence.clamp(0.0, 1.0),
            rationale: None,
            metadata: OutputMetadata {
                model,
                timestamp: Utc::now(),
                processing_time,
            },
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
