//! Backend registry - endpoint and model names resolved before execution

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::{CoreModel, InferenceBackend};
use crate::dag::ValidatedGraph;
use crate::error::AdcsError;
use crate::node::NodeKind;

/// Named inference backends and core models
#[derive(Clone, Default)]
pub struct Backends {
    endpoints: FxHashMap<String, Arc<dyn InferenceBackend>>,
    models: FxHashMap<String, Arc<dyn CoreModel>>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, name: impl Into<String>, backend: Arc<dyn InferenceBackend>) -> Self {
        self.endpoints.insert(name.into(), backend);
        self
    }

    pub fn with_model(mut self, name: impl Into<String>, model: Arc<dyn CoreModel>) -> Self {
        self.models.insert(name.into(), model);
        self
    }

    pub fn register_endpoint(&mut self, name: impl Into<String>, backend: Arc<dyn InferenceBackend>) {
        self.endpoints.insert(name.into(), backend);
    }

    pub fn register_model(&mut self, name: impl Into<String>, model: Arc<dyn CoreModel>) {
        self.models.insert(name.into(), model);
    }

    pub fn endpoint(&self, name: &str) -> Option<&Arc<dyn InferenceBackend>> {
        self.endpoints.get(name)
    }

    pub fn model(&self, name: &str) -> Option<&Arc<dyn CoreModel>> {
        self.models.get(name)
    }

    /// Every endpoint and core model referenced by `graph` must be registered
    pub fn check_graph(&self, graph: &ValidatedGraph) -> Result<(), AdcsError> {
        for node in graph.nodes() {
            if let NodeKind::Provider(spec) = &node.kind {
                if !self.endpoints.contains_key(&spec.endpoint) {
                    return Err(AdcsError::UnknownEndpoint {
                        node_id: node.id.to_string(),
                        endpoint: spec.endpoint.clone(),
                    });
                }
            }
            for model in node.core_models() {
                if !self.models.contains_key(model) {
                    return Err(AdcsError::UnknownModel {
                        node_id: node.id.to_string(),
                        model: model.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Backends {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut endpoints: Vec<&str> = self.endpoints.keys().map(String::as_str).collect();
        let mut models: Vec<&str> = self.models.keys().map(String::as_str).collect();
        endpoints.sort_unstable();
        models.sort_unstable();
        f.debug_struct("Backends")
            .field("endpoints", &endpoints)
            .field("models", &models)
            .finish()
    }
}
