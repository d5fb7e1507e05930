//! Risk assessment demo
//!
//! Three providers score a borrower, a weighted average labels the risk, and a
//! core model explains the verdict. Backends are mocks; swap in real
//! `InferenceBackend` implementations to call live services.
//!
//! Run: RUST_LOG=adcs=debug cargo run --example risk_assessment

use std::sync::Arc;

use adcs::provider::{MockBackend, MockModel};
use adcs::{
    AdaptorConfig, AdaptorGraph, AggregationMethod, Backends, CancellationToken, CollectingSink, ConflictConfig,
    ConflictPolicy, Engine, EngineConfig, InvocationRequest, Node, OutputFormat, ScoreBands, Transform,
};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let backends = Backends::new()
        .with_endpoint("credit-bureau", Arc::new(MockBackend::returning(json!(70), 0.92)))
        .with_endpoint("market-feed", Arc::new(MockBackend::returning(json!(40), 0.85)))
        .with_endpoint("onchain-history", Arc::new(MockBackend::returning(json!(50), 0.88)))
        .with_model(
            "analyst",
            Arc::new(MockModel::explaining(
                "Credit history dominates; market and on-chain signals are moderate.",
            )),
        );

    let mut graph = AdaptorGraph::new();
    graph
        .add_node(Node::provider("credit", OutputFormat::Uint256, "credit-bureau", "fico-v9"))?
        .add_node(Node::provider("market", OutputFormat::Uint256, "market-feed", "volatility-v2"))?
        .add_node(Node::provider("onchain", OutputFormat::Uint256, "onchain-history", "ledger-v1"))?
        .add_node(Node::multi_input(
            "risk",
            OutputFormat::StringAndUint256,
            ["credit", "market", "onchain"],
            Transform::new(
                AdaptorConfig::new(AggregationMethod::WeightedAverage)
                    .with_weight("credit", 0.5)
                    .with_weight("market", 0.3)
                    .with_weight("onchain", 0.2)
                    .with_conflict(ConflictConfig {
                        significant_difference: Some(60.0),
                        margin: 0.0,
                        policy: ConflictPolicy::FallbackAverage,
                    })
                    .with_score_bands(ScoreBands::new(33, 66)),
            )
            .with_model("analyst")
            .with_context("Summarize the borrower's risk for a lending protocol."),
        ))?;

    let sink = Arc::new(CollectingSink::new());
    let engine = Engine::new(EngineConfig::load()?.with_env()?, backends)?.with_sink(sink.clone());
    engine.register("borrower-risk", graph)?;

    let request = InvocationRequest::new("loan-4821", json!({"borrower": "0x51f0"})).with_callback("0xLendingPool");
    let report = engine
        .execute("borrower-risk", request, CancellationToken::new())
        .await?;

    println!("output:     {}", report.output);
    println!("confidence: {:.2}", report.confidence);
    if let Some(rationale) = &report.rationale {
        println!("rationale:  {}", rationale);
    }
    for record in &report.trace {
        let elapsed = record.ended_at_ms.map(|end| end - record.started_at_ms).unwrap_or_default();
        println!("  {:<8} {:>4}ms {:?}", record.node_id, elapsed, record.output);
    }
    println!("delivered:  {} settlement(s)", sink.len());

    Ok(())
}
