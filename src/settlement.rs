//! Settlement handoff - where a completed invocation's value goes
//!
//! The engine never talks to a ledger. It hands the terminal value, its
//! confidence and the consumer callback to a `SettlementSink` once the
//! invocation has completed and was not cancelled.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{AdcsError, Result};
use crate::format::FormattedValue;

/// Final, typed value handed to settlement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub request_id: Arc<str>,
    /// Consumer callback address, opaque to the engine
    pub callback: String,
    pub value: FormattedValue,
    pub confidence: f64,
    pub rationale: Option<String>,
}

#[async_trait]
pub trait SettlementSink: Send + Sync {
    async fn deliver(&self, delivery: Delivery) -> Result<()>;
}

/// Discards every delivery
#[derive(Debug, Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl SettlementSink for NoopSink {
    async fn deliver(&self, _delivery: Delivery) -> Result<()> {
        Ok(())
    }
}

/// Keeps deliveries in memory; can be told to reject them
#[derive(Debug, Default)]
pub struct CollectingSink {
    deliveries: Mutex<Vec<Delivery>>,
    reject_with: Option<String>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every delivery fails with `reason`
    pub fn rejecting(reason: impl Into<String>) -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
            reject_with: Some(reason.into()),
        }
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.deliveries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SettlementSink for CollectingSink {
    async fn deliver(&self, delivery: Delivery) -> Result<()> {
        if let Some(reason) = &self.reject_with {
            return Err(AdcsError::SettlementFailed {
                request_id: delivery.request_id.to_string(),
                reason: reason.clone(),
            });
        }
        self.deliveries.lock().push(delivery);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delivery() -> Delivery {
        Delivery {
            request_id: Arc::from("req-1"),
            callback: "0xfeed".to_string(),
            value: FormattedValue::Bool(true),
            confidence: 0.9,
            rationale: None,
        }
    }

    #[tokio::test]
    async fn collecting_sink_records() {
        let sink = CollectingSink::new();
        sink.deliver(delivery()).await.unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.deliveries()[0].callback, "0xfeed");
    }

    #[tokio::test]
    async fn rejecting_sink_reports_settlement_failure() {
        let sink = CollectingSink::rejecting("callback reverted");
        let err = sink.deliver(delivery()).await.unwrap_err();
        assert_eq!(err.code(), "ADCS-080");
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn sink_is_object_safe() {
        let sink: Arc<dyn SettlementSink> = Arc::new(NoopSink);
        assert!(sink.deliver(delivery()).await.is_ok());
    }
}
