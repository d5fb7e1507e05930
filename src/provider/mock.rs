//! Deterministic backends for tests and demos

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{CoreModel, InferenceBackend, ModelResponse, ProviderOutput, ReasoningRequest};

/// Backend returning a fixed result (or a fixed failure), optionally delayed
pub struct MockBackend {
    reply: Result<(Value, f64), String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockBackend {
    pub fn returning(result: Value, confidence: f64) -> Self {
        Self {
            reply: Ok((result, confidence)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            reply: Err(reason.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep before answering (tokio time, so paused clocks apply)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `process` calls started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for MockBackend {
    async fn process(&self, model: &str, _input: &Value) -> anyhow::Result<ProviderOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Ok((result, confidence)) => Ok(ProviderOutput::new(result.clone(), *confidence, model)),
            Err(reason) => anyhow::bail!("{}", reason),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Core model returning a fixed response, recording what it was asked
pub struct MockModel {
    reply: Result<ModelResponse, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_request: Mutex<Option<ReasoningRequest>>,
}

impl MockModel {
    pub fn answering(response: ModelResponse) -> Self {
        Self {
            reply: Ok(response),
            delay: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Text-only answer, as used for explanations
    pub fn explaining(text: impl Into<String>) -> Self {
        Self::answering(ModelResponse::text(text))
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            reply: Err(reason.into()),
            delay: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ReasoningRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl CoreModel for MockModel {
    async fn reason(&self, request: ReasoningRequest) -> anyhow::Result<ModelResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Ok(response) => Ok(response.clone()),
            Err(reason) => anyhow::bail!("{}", reason),
        }
    }

    fn name(&self) -> &str {
        "mock-model"
    }
}
