//! Shared builders for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use adcs::provider::{MockBackend, MockModel};
use adcs::{
    AdaptorGraph, Backends, CollectingSink, Engine, EngineConfig, EventLog, InvocationRequest, Node,
    OutputFormat, ValidatedGraph,
};
use serde_json::{json, Value};

/// Provider node reading from an endpoint of the same name
pub fn provider(id: &str, format: OutputFormat) -> Node {
    Node::provider(id, format, id, format!("{}-model", id))
}

pub fn fixed(result: Value, confidence: f64) -> Arc<MockBackend> {
    Arc::new(MockBackend::returning(result, confidence))
}

pub fn slow(result: Value, confidence: f64, delay: Duration) -> Arc<MockBackend> {
    Arc::new(MockBackend::returning(result, confidence).with_delay(delay))
}

pub fn broken(reason: &str) -> Arc<MockBackend> {
    Arc::new(MockBackend::failing(reason))
}

pub fn model(text: &str) -> Arc<MockModel> {
    Arc::new(MockModel::explaining(text))
}

pub fn request() -> InvocationRequest {
    InvocationRequest::new("req-1", json!({"subject": "0xabc"})).with_callback("0xconsumer")
}

pub fn validated(build: impl FnOnce(&mut AdaptorGraph)) -> ValidatedGraph {
    let mut graph = AdaptorGraph::new();
    build(&mut graph);
    graph.validate().unwrap()
}

/// Engine wired to a collecting sink and an observer log
pub struct Harness {
    pub engine: Engine,
    pub sink: Arc<CollectingSink>,
    pub observer: EventLog,
}

pub fn harness(config: EngineConfig, backends: Backends) -> Harness {
    let sink = Arc::new(CollectingSink::new());
    let observer = EventLog::new();
    let engine = Engine::new(config, backends)
        .unwrap()
        .with_sink(sink.clone())
        .with_observer(Arc::new(observer.clone()));
    Harness {
        engine,
        sink,
        observer,
    }
}
