//! Node Abstraction - the closed set of node variants
//!
//! Contains:
//! - `Node`: id, declared output format, optional timeout, variant payload
//! - `NodeKind`: Provider | SingleInput | MultiInput | Chained
//! - `Transform`: the reasoning part shared by adaptors and chain links
//! - `NodeOutput`: value + confidence + metadata produced by any node
//!
//! Node definitions are immutable once a graph is validated; the runtime only
//! reads them through `Arc`.

mod config;
mod output;

pub use config::{
    AdaptorConfig, AggregationMethod, ConflictConfig, ConflictPolicy, NormalizationConfig,
    NormalizationMethod,
};
pub use output::{NodeOutput, OutputMetadata};

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::format::OutputFormat;

/// Leaf node payload: which backend to call and with which model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub endpoint: String,
    pub model: String,
}

/// Reasoning applied by an adaptor or a chain link
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    /// Registered core model; `None` means rule-based processing only
    pub core_model: Option<String>,
    /// Immutable instructions handed to the core model
    pub static_context: String,
    pub config: AdaptorConfig,
    /// Explicit acceptance list; falls back to the method's own set
    pub accepts: Option<Vec<OutputFormat>>,
}

impl Transform {
    pub fn new(config: AdaptorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.core_model = Some(model.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.static_context = context.into();
        self
    }

    pub fn accepting(mut self, formats: impl IntoIterator<Item = OutputFormat>) -> Self {
        self.accepts = Some(formats.into_iter().collect());
        self
    }

    /// Formats this transform consumes (`None` = any, as opaque context)
    pub fn accepted_formats(&self) -> Option<&[OutputFormat]> {
        match &self.accepts {
            Some(list) => Some(list.as_slice()),
            None => self.config.method.accepted_formats(),
        }
    }

    pub fn accepts_format(&self, format: OutputFormat) -> bool {
        self.accepted_formats()
            .map_or(true, |formats| formats.contains(&format))
    }
}

/// Single- or multi-input adaptor payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptorSpec {
    /// Upstream node ids, in declaration order
    pub inputs: Vec<Arc<str>>,
    #[serde(flatten)]
    pub transform: Transform,
}

/// One step of a chained adaptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainLink {
    pub name: String,
    /// Format the link consumes; the incoming value is converted when it differs
    pub input_format: Option<OutputFormat>,
    pub output_format: OutputFormat,
    #[serde(flatten)]
    pub transform: Transform,
}

impl ChainLink {
    pub fn new(name: impl Into<String>, output_format: OutputFormat, transform: Transform) -> Self {
        Self {
            name: name.into(),
            input_format: None,
            output_format,
            transform,
        }
    }

    pub fn with_input_format(mut self, format: OutputFormat) -> Self {
        self.input_format = Some(format);
        self
    }
}

/// Chained adaptor payload: one upstream, links run in sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSpec {
    pub input: Arc<str>,
    pub links: Vec<ChainLink>,
}

/// Variant payload; exhaustive so readiness rules stay visible in one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Provider(ProviderSpec),
    SingleInput(AdaptorSpec),
    MultiInput(AdaptorSpec),
    Chained(ChainSpec),
}

impl NodeKind {
    pub fn variant(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider",
            Self::SingleInput(_) => "single_input",
            Self::MultiInput(_) => "multi_input",
            Self::Chained(_) => "chained",
        }
    }
}

/// A declared node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Arc<str>,
    pub output_format: OutputFormat,
    /// Overrides the engine's default per-node timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn provider(
        id: impl Into<Arc<str>>,
        output_format: OutputFormat,
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self::with_kind(
            id,
            output_format,
            NodeKind::Provider(ProviderSpec {
                endpoint: endpoint.into(),
                model: model.into(),
            }),
        )
    }

    pub fn single_input(
        id: impl Into<Arc<str>>,
        output_format: OutputFormat,
        input: impl Into<Arc<str>>,
        transform: Transform,
    ) -> Self {
        Self::with_kind(
            id,
            output_format,
            NodeKind::SingleInput(AdaptorSpec {
                inputs: vec![input.into()],
                transform,
            }),
        )
    }

    pub fn multi_input<I, S>(
        id: impl Into<Arc<str>>,
        output_format: OutputFormat,
        inputs: I,
        transform: Transform,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self::with_kind(
            id,
            output_format,
            NodeKind::MultiInput(AdaptorSpec {
                inputs: inputs.into_iter().map(Into::into).collect(),
                transform,
            }),
        )
    }

    pub fn chained(
        id: impl Into<Arc<str>>,
        output_format: OutputFormat,
        input: impl Into<Arc<str>>,
        links: Vec<ChainLink>,
    ) -> Self {
        Self::with_kind(
            id,
            output_format,
            NodeKind::Chained(ChainSpec {
                input: input.into(),
                links,
            }),
        )
    }

    fn with_kind(id: impl Into<Arc<str>>, output_format: OutputFormat, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            output_format,
            timeout_ms: None,
            kind,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn is_provider(&self) -> bool {
        matches!(self.kind, NodeKind::Provider(_))
    }

    /// Upstream ids this node waits for
    pub fn inputs(&self) -> &[Arc<str>] {
        match &self.kind {
            NodeKind::Provider(_) => &[],
            NodeKind::SingleInput(spec) | NodeKind::MultiInput(spec) => &spec.inputs,
            NodeKind::Chained(spec) => std::slice::from_ref(&spec.input),
        }
    }

    /// Core models referenced by the node (adaptor transform or chain links)
    pub fn core_models(&self) -> Vec<&str> {
        match &self.kind {
            NodeKind::Provider(_) => Vec::new(),
            NodeKind::SingleInput(spec) | NodeKind::MultiInput(spec) => {
                spec.transform.core_model.as_deref().into_iter().collect()
            }
            NodeKind::Chained(spec) => spec
                .links
                .iter()
                .filter_map(|link| link.transform.core_model.as_deref())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_per_variant() {
        let provider = Node::provider("p", OutputFormat::Bool, "ep", "m");
        assert!(provider.inputs().is_empty());
        assert!(provider.is_provider());

        let multi = Node::multi_input(
            "agg",
            OutputFormat::Bool,
            ["a", "b"],
            Transform::new(AdaptorConfig::new(AggregationMethod::Voting)),
        );
        assert_eq!(multi.inputs().len(), 2);
        assert_eq!(multi.inputs()[1].as_ref(), "b");

        let chain = Node::chained("c", OutputFormat::Bool, "agg", vec![]);
        assert_eq!(chain.inputs(), &[Arc::<str>::from("agg")]);
    }

    #[test]
    fn transform_acceptance_defaults_to_method() {
        let voting = Transform::new(AdaptorConfig::new(AggregationMethod::Voting));
        assert!(voting.accepts_format(OutputFormat::StringAndBool));
        assert!(!voting.accepts_format(OutputFormat::Uint256));

        let explicit = voting.accepting([OutputFormat::Uint256]);
        assert!(explicit.accepts_format(OutputFormat::Uint256));
        assert!(!explicit.accepts_format(OutputFormat::Bool));

        let opaque = Transform::new(AdaptorConfig::new(AggregationMethod::Concatenation));
        assert!(opaque.accepts_format(OutputFormat::Bytes32));
    }

    #[test]
    fn chain_collects_link_models() {
        let links = vec![
            ChainLink::new("a", OutputFormat::Bool, Transform::default().with_model("m1")),
            ChainLink::new("b", OutputFormat::Bool, Transform::default()),
            ChainLink::new("c", OutputFormat::Bool, Transform::default().with_model("m2")),
        ];
        let chain = Node::chained("c", OutputFormat::Bool, "up", links);
        assert_eq!(chain.core_models(), vec!["m1", "m2"]);
    }

    #[test]
    fn timeout_round_trips_through_millis() {
        let node = Node::provider("p", OutputFormat::Bool, "ep", "m")
            .with_timeout(Duration::from_millis(250));
        assert_eq!(node.timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn deserializes_tagged_node() {
        let node: Node = serde_json::from_value(serde_json::json!({
            "id": "risk",
            "output_format": "StringAndUint256",
            "kind": "multi_input",
            "inputs": ["financial", "news"],
            "config": {"method": "weightedAverage"}
        }))
        .unwrap();
        assert_eq!(node.kind.variant(), "multi_input");
        assert_eq!(node.inputs().len(), 2);
    }
}
