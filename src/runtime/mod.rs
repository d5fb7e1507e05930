//! Runtime Module - graph invocation
//!
//! Contains the runtime execution components:
//! - `engine`: graph catalog, entry point for invocations
//! - `runner`: wave-by-wave execution with tokio concurrency
//! - `adaptor`: missing-input policy, aggregation, rendering
//! - `chain`: ordered link execution with inter-link coercion
//!
//! For static structure, see the `dag` and `node` modules.

mod adaptor;
mod chain;
mod context;
mod engine;
mod runner;

pub use chain::ChainState;
pub use engine::Engine;
pub use runner::{InvocationReport, Runner};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a client submits alongside a graph id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub request_id: Arc<str>,
    /// Raw input handed to every provider
    #[serde(default)]
    pub input: Value,
    /// Consumer callback address passed through to settlement
    #[serde(default)]
    pub callback: String,
}

impl InvocationRequest {
    pub fn new(request_id: impl Into<Arc<str>>, input: Value) -> Self {
        Self {
            request_id: request_id.into(),
            input,
            callback: String::new(),
        }
    }

    pub fn with_callback(mut self, callback: impl Into<String>) -> Self {
        self.callback = callback.into();
        self
    }
}
