// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! ADCS Error Types with Error Codes
//!
//! Error code ranges:
//! - ADCS-010-029: Graph validation errors (fatal at construction)
//! - ADCS-030-039: Node invocation errors (recoverable via `allow_partial`)
//! - ADCS-040-049: Aggregation errors
//! - ADCS-050-059: Conversion errors
//! - ADCS-060-069: Chain errors
//! - ADCS-070-079: Runtime errors
//! - ADCS-080-089: Settlement errors
//! - ADCS-090-099: Config errors

use std::fmt;
use std::sync::Arc;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::{ConversionError, OutputFormat};

pub type Result<T> = std::result::Result<T, AdcsError>;

/// Error taxonomy used to locate a failure without re-running the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    GraphValidation,
    NodeInvocation,
    Aggregation,
    Conversion,
    ChainExecution,
    Cancelled,
    Settlement,
    Config,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GraphValidation => "graph_validation",
            Self::NodeInvocation => "node_invocation",
            Self::Aggregation => "aggregation",
            Self::Conversion => "conversion",
            Self::ChainExecution => "chain_execution",
            Self::Cancelled => "cancelled",
            Self::Settlement => "settlement",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All error variants are part of the public API.
///
/// Implements both `thiserror::Error` for std error compatibility
/// and `miette::Diagnostic` for fancy terminal error display.
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum AdcsError {
    // ═══════════════════════════════════════════
    // GRAPH VALIDATION ERRORS (010-029)
    // ═══════════════════════════════════════════
    #[error("[ADCS-010] Cycle detected in graph: {cycle}")]
    #[diagnostic(
        code(adcs::cycle_detected),
        help("Remove one of the edges listed in the cycle")
    )]
    CycleDetected { cycle: String },

    #[error("[ADCS-011] Node '{node_id}' references unknown node '{missing}'")]
    #[diagnostic(code(adcs::dangling_reference))]
    DanglingReference { node_id: String, missing: String },

    #[error("[ADCS-012] Node '{node_id}' cannot consume {format} from '{source_id}' (accepts: {accepted})")]
    #[diagnostic(
        code(adcs::type_mismatch),
        help("Declare an 'accepts' list or pick a method that consumes this format")
    )]
    TypeMismatch {
        node_id: String,
        source_id: String,
        format: OutputFormat,
        accepted: String,
    },

    #[error("[ADCS-013] Duplicate node id '{id}'")]
    DuplicateNode { id: String },

    #[error("[ADCS-014] Node '{node_id}' ({variant}) needs {expected}, has {actual}")]
    InvalidArity {
        node_id: String,
        variant: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("[ADCS-015] Invalid config on '{node_id}': {reason}")]
    #[diagnostic(code(adcs::invalid_config))]
    InvalidConfig { node_id: String, reason: String },

    #[error("[ADCS-016] Invalid node id '{id}': {reason}")]
    InvalidNodeId { id: String, reason: String },

    #[error("[ADCS-017] Invalid edge '{source_id}' -> '{target_id}': {reason}")]
    InvalidEdge {
        source_id: String,
        target_id: String,
        reason: String,
    },

    #[error("[ADCS-018] Graph has several sink nodes ({sinks}) and no terminal")]
    #[diagnostic(help("Call set_terminal() to pick the node whose output is delivered"))]
    AmbiguousTerminal { sinks: String },

    #[error("[ADCS-019] Graph has no nodes")]
    EmptyGraph,

    #[error("[ADCS-020] Provider '{node_id}' uses unregistered endpoint '{endpoint}'")]
    UnknownEndpoint { node_id: String, endpoint: String },

    #[error("[ADCS-021] Node '{node_id}' uses unregistered core model '{model}'")]
    UnknownModel { node_id: String, model: String },

    // ═══════════════════════════════════════════
    // NODE INVOCATION ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[ADCS-030] Provider '{node_id}' call to '{endpoint}' failed: {reason}")]
    ProviderFailed {
        node_id: String,
        endpoint: String,
        reason: String,
    },

    #[error("[ADCS-031] Core model '{model}' failed for '{node_id}': {reason}")]
    ModelFailed {
        node_id: String,
        model: String,
        reason: String,
    },

    #[error("[ADCS-032] Node '{node_id}' timed out after {timeout_ms}ms")]
    NodeTimeout { node_id: String, timeout_ms: u64 },

    #[error("[ADCS-033] Node '{node_id}' returned malformed output: {reason}")]
    MalformedOutput { node_id: String, reason: String },

    // ═══════════════════════════════════════════
    // AGGREGATION ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[ADCS-040] No valid inputs for '{node_id}': {reason}")]
    NoValidInputs { node_id: String, reason: String },

    #[error("[ADCS-041] Adaptor '{node_id}' is missing required input '{input_id}': {cause}")]
    #[diagnostic(
        code(adcs::missing_required_input),
        help("Set allow_partial on the adaptor to proceed with the remaining inputs")
    )]
    MissingRequiredInput {
        node_id: String,
        input_id: String,
        cause: Arc<AdcsError>,
    },

    #[error("[ADCS-042] Input '{source_id}' of '{node_id}' is {actual}, method {method} needs {expected}")]
    UnexpectedInput {
        node_id: String,
        source_id: String,
        method: &'static str,
        expected: &'static str,
        actual: OutputFormat,
    },

    // ═══════════════════════════════════════════
    // CONVERSION ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[ADCS-050] Conversion failed at '{node_id}': {source}")]
    Conversion {
        node_id: String,
        #[source]
        source: ConversionError,
    },

    // ═══════════════════════════════════════════
    // CHAIN ERRORS (060-069)
    // ═══════════════════════════════════════════
    #[error("[ADCS-060] Chain '{node_id}' failed at link {link_index} ('{link}'): {source}")]
    ChainLinkFailed {
        node_id: String,
        link_index: usize,
        link: String,
        #[source]
        source: Box<AdcsError>,
    },

    // ═══════════════════════════════════════════
    // RUNTIME ERRORS (070-079)
    // ═══════════════════════════════════════════
    #[error("[ADCS-070] Unknown graph '{graph_id}'")]
    UnknownGraph { graph_id: String },

    #[error("[ADCS-071] Graph '{graph_id}' is already registered")]
    GraphAlreadyRegistered { graph_id: String },

    #[error("[ADCS-072] Invocation '{invocation_id}' was cancelled")]
    Cancelled { invocation_id: String },

    #[error("[ADCS-073] Node '{node_id}' already has a recorded result")]
    DuplicateResult { node_id: String },

    #[error("[ADCS-074] Internal error: {reason}")]
    Internal { reason: String },

    // ═══════════════════════════════════════════
    // SETTLEMENT ERRORS (080-089)
    // ═══════════════════════════════════════════
    #[error("[ADCS-080] Settlement of request '{request_id}' failed: {reason}")]
    SettlementFailed { request_id: String, reason: String },

    // ═══════════════════════════════════════════
    // CONFIG ERRORS (090-099)
    // ═══════════════════════════════════════════
    #[error("[ADCS-090] Invalid engine config '{field}': {reason}")]
    ConfigInvalid { field: &'static str, reason: String },

    #[error("[ADCS-091] Failed to load config from {path}: {reason}")]
    #[diagnostic(help("Check the TOML syntax of the engine config file"))]
    ConfigLoad { path: String, reason: String },
}

impl AdcsError {
    /// Get the error code (e.g., "ADCS-010")
    pub fn code(&self) -> &'static str {
        match self {
            Self::CycleDetected { .. } => "ADCS-010",
            Self::DanglingReference { .. } => "ADCS-011",
            Self::TypeMismatch { .. } => "ADCS-012",
            Self::DuplicateNode { .. } => "ADCS-013",
            Self::InvalidArity { .. } => "ADCS-014",
            Self::InvalidConfig { .. } => "ADCS-015",
            Self::InvalidNodeId { .. } => "ADCS-016",
            Self::InvalidEdge { .. } => "ADCS-017",
            Self::AmbiguousTerminal { .. } => "ADCS-018",
            Self::EmptyGraph => "ADCS-019",
            Self::UnknownEndpoint { .. } => "ADCS-020",
            Self::UnknownModel { .. } => "ADCS-021",

            Self::ProviderFailed { .. } => "ADCS-030",
            Self::ModelFailed { .. } => "ADCS-031",
            Self::NodeTimeout { .. } => "ADCS-032",
            Self::MalformedOutput { .. } => "ADCS-033",

            Self::NoValidInputs { .. } => "ADCS-040",
            Self::MissingRequiredInput { .. } => "ADCS-041",
            Self::UnexpectedInput { .. } => "ADCS-042",

            Self::Conversion { .. } => "ADCS-050",

            Self::ChainLinkFailed { .. } => "ADCS-060",

            Self::UnknownGraph { .. } => "ADCS-070",
            Self::GraphAlreadyRegistered { .. } => "ADCS-071",
            Self::Cancelled { .. } => "ADCS-072",
            Self::DuplicateResult { .. } => "ADCS-073",
            Self::Internal { .. } => "ADCS-074",

            Self::SettlementFailed { .. } => "ADCS-080",

            Self::ConfigInvalid { .. } => "ADCS-090",
            Self::ConfigLoad { .. } => "ADCS-091",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CycleDetected { .. }
            | Self::DanglingReference { .. }
            | Self::TypeMismatch { .. }
            | Self::DuplicateNode { .. }
            | Self::InvalidArity { .. }
            | Self::InvalidConfig { .. }
            | Self::InvalidNodeId { .. }
            | Self::InvalidEdge { .. }
            | Self::AmbiguousTerminal { .. }
            | Self::EmptyGraph
            | Self::UnknownEndpoint { .. }
            | Self::UnknownModel { .. } => ErrorKind::GraphValidation,

            Self::ProviderFailed { .. }
            | Self::ModelFailed { .. }
            | Self::NodeTimeout { .. }
            | Self::MalformedOutput { .. } => ErrorKind::NodeInvocation,

            Self::NoValidInputs { .. }
            | Self::MissingRequiredInput { .. }
            | Self::UnexpectedInput { .. } => ErrorKind::Aggregation,

            Self::Conversion { .. } => ErrorKind::Conversion,
            Self::ChainLinkFailed { .. } => ErrorKind::ChainExecution,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::SettlementFailed { .. } => ErrorKind::Settlement,
            Self::ConfigInvalid { .. } | Self::ConfigLoad { .. } => ErrorKind::Config,

            Self::UnknownGraph { .. }
            | Self::GraphAlreadyRegistered { .. }
            | Self::DuplicateResult { .. }
            | Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Node the failure originated at, when there is one
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::DanglingReference { node_id, .. }
            | Self::TypeMismatch { node_id, .. }
            | Self::InvalidArity { node_id, .. }
            | Self::InvalidConfig { node_id, .. }
            | Self::UnknownEndpoint { node_id, .. }
            | Self::UnknownModel { node_id, .. }
            | Self::ProviderFailed { node_id, .. }
            | Self::ModelFailed { node_id, .. }
            | Self::NodeTimeout { node_id, .. }
            | Self::MalformedOutput { node_id, .. }
            | Self::NoValidInputs { node_id, .. }
            | Self::MissingRequiredInput { node_id, .. }
            | Self::UnexpectedInput { node_id, .. }
            | Self::Conversion { node_id, .. }
            | Self::ChainLinkFailed { node_id, .. }
            | Self::DuplicateResult { node_id, .. } => Some(node_id),
            Self::DuplicateNode { id } | Self::InvalidNodeId { id, .. } => Some(id),
            Self::InvalidEdge { target_id, .. } => Some(target_id),
            Self::CycleDetected { .. }
            | Self::AmbiguousTerminal { .. }
            | Self::EmptyGraph
            | Self::UnknownGraph { .. }
            | Self::GraphAlreadyRegistered { .. }
            | Self::Cancelled { .. }
            | Self::Internal { .. }
            | Self::SettlementFailed { .. }
            | Self::ConfigInvalid { .. }
            | Self::ConfigLoad { .. } => None,
        }
    }

    /// Node invocation failures feed the missing-input policy; nothing else does
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::NodeInvocation
    }

    /// Innermost error, unwrapping chain link failures
    pub fn root_cause(&self) -> &AdcsError {
        match self {
            Self::ChainLinkFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        let err = AdcsError::CycleDetected {
            cycle: "a -> b -> a".into(),
        };
        assert_eq!(err.code(), "ADCS-010");
        assert!(err.to_string().starts_with("[ADCS-010]"));
        assert_eq!(err.kind(), ErrorKind::GraphValidation);
    }

    #[test]
    fn node_invocation_errors_are_recoverable() {
        let timeout = AdcsError::NodeTimeout {
            node_id: "news".into(),
            timeout_ms: 500,
        };
        assert!(timeout.is_recoverable());
        assert_eq!(timeout.node_id(), Some("news"));

        let missing = AdcsError::MissingRequiredInput {
            node_id: "agg".into(),
            input_id: "news".into(),
            cause: Arc::new(timeout),
        };
        assert!(!missing.is_recoverable());
        assert_eq!(missing.kind(), ErrorKind::Aggregation);
        assert!(missing.to_string().contains("ADCS-032"));
    }

    #[test]
    fn chain_failure_keeps_link_index_and_root_cause() {
        let err = AdcsError::ChainLinkFailed {
            node_id: "pipeline".into(),
            link_index: 2,
            link: "score".into(),
            source: Box::new(AdcsError::ModelFailed {
                node_id: "pipeline".into(),
                model: "m".into(),
                reason: "unavailable".into(),
            }),
        };
        assert_eq!(err.kind(), ErrorKind::ChainExecution);
        assert_eq!(err.root_cause().code(), "ADCS-031");
        assert!(err.to_string().contains("link 2"));
    }

    #[test]
    fn conversion_wraps_pure_error() {
        let err = AdcsError::Conversion {
            node_id: "out".into(),
            source: ConversionError::Unsupported {
                from: "Bool".into(),
                to: OutputFormat::Uint256,
            },
        };
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert!(err.to_string().contains("Bool -> Uint256"));
    }
}
