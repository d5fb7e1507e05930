//! Engine Integration Tests
//!
//! End-to-end invocations over mock providers and models: aggregation,
//! conflict resolution, chains, missing-input policy, settlement.

mod common;

use std::sync::Arc;

use adcs::provider::MockModel;
use adcs::{
    AdaptorConfig, AggregationMethod, Backends, CancellationToken, ChainLink, ConflictConfig, ConflictPolicy,
    EngineConfig, EventKind, FormattedValue, ModelResponse, Node, OutputFormat, ScoreBands, Transform,
};
use common::{broken, fixed, harness, model, provider, request, validated};
use pretty_assertions::assert_eq;
use serde_json::json;

// ═══════════════════════════════════════════════════════════════
// AGGREGATION
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_weighted_voting_confident_yes_wins() {
    let backends = Backends::new()
        .with_endpoint("yes", fixed(json!(true), 0.9))
        .with_endpoint("no", fixed(json!(false), 0.4));
    let h = harness(EngineConfig::default(), backends);

    h.engine
        .register_graph(
            "solvency",
            validated(|g| {
                g.add_node(provider("yes", OutputFormat::Bool)).unwrap();
                g.add_node(provider("no", OutputFormat::Bool)).unwrap();
                g.add_node(Node::multi_input(
                    "verdict",
                    OutputFormat::Bool,
                    ["yes", "no"],
                    Transform::new(AdaptorConfig::new(AggregationMethod::WeightedVoting)),
                ))
                .unwrap();
            }),
        )
        .unwrap();

    let report = h
        .engine
        .execute("solvency", request(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.output, FormattedValue::Bool(true));
    assert_eq!(report.rationale.as_deref(), Some("weightedVoting: true 0.45 vs false 0.20"));
    assert_eq!(report.request_id.as_ref(), "req-1");
    assert_eq!(h.sink.len(), 1);
}

#[tokio::test]
async fn test_risk_score_weighted_average_is_medium() {
    let backends = Backends::new()
        .with_endpoint("credit", fixed(json!(70), 1.0))
        .with_endpoint("market", fixed(json!(40), 1.0))
        .with_endpoint("onchain", fixed(json!(50), 1.0));
    let h = harness(EngineConfig::default(), backends);

    let config = AdaptorConfig::new(AggregationMethod::WeightedAverage)
        .with_weight("credit", 0.5)
        .with_weight("market", 0.3)
        .with_weight("onchain", 0.2)
        .with_score_bands(ScoreBands::new(33, 66));

    h.engine
        .register_graph(
            "risk",
            validated(|g| {
                for id in ["credit", "market", "onchain"] {
                    g.add_node(provider(id, OutputFormat::Uint256)).unwrap();
                }
                g.add_node(Node::multi_input(
                    "risk",
                    OutputFormat::StringAndUint256,
                    ["credit", "market", "onchain"],
                    Transform::new(config),
                ))
                .unwrap();
            }),
        )
        .unwrap();

    let report = h.engine.execute("risk", request(), CancellationToken::new()).await.unwrap();

    assert_eq!(report.output, FormattedValue::StringAndUint256("MEDIUM".into(), 57));
    let delivered = h.sink.deliveries();
    assert_eq!(delivered[0].callback, "0xconsumer");
    assert_eq!(delivered[0].value, report.output);
}

// ═══════════════════════════════════════════════════════════════
// CONFLICT RESOLUTION
// ═══════════════════════════════════════════════════════════════

fn spread_graph(a: u64, b: u64) -> (Backends, adcs::ValidatedGraph) {
    let backends = Backends::new()
        .with_endpoint("low", fixed(json!(a), 0.6))
        .with_endpoint("high", fixed(json!(b), 0.9));
    let config = AdaptorConfig::new(AggregationMethod::WeightedAverage).with_conflict(ConflictConfig {
        significant_difference: Some(40.0),
        margin: 0.0,
        policy: ConflictPolicy::MaxConfidence,
    });
    let graph = validated(|g| {
        g.add_node(provider("low", OutputFormat::Uint256)).unwrap();
        g.add_node(provider("high", OutputFormat::Uint256)).unwrap();
        g.add_node(Node::multi_input(
            "score",
            OutputFormat::Uint256,
            ["low", "high"],
            Transform::new(config),
        ))
        .unwrap();
    });
    (backends, graph)
}

#[tokio::test]
async fn test_close_scores_average_normally() {
    let (backends, graph) = spread_graph(20, 25);
    let h = harness(EngineConfig::default(), backends);
    h.engine.register_graph("spread", graph).unwrap();

    let report = h.engine.execute("spread", request(), CancellationToken::new()).await.unwrap();

    // (20*0.6 + 25*0.9) / 1.5 = 23.0
    assert_eq!(report.output, FormattedValue::Uint256(23));
    let resolved = h
        .observer
        .events()
        .iter()
        .any(|e| matches!(e.kind, EventKind::ConflictResolved { .. }));
    assert!(!resolved);
}

#[tokio::test]
async fn test_divergent_scores_trigger_resolution() {
    let (backends, graph) = spread_graph(10, 90);
    let h = harness(EngineConfig::default(), backends);
    h.engine.register_graph("spread", graph).unwrap();

    let report = h.engine.execute("spread", request(), CancellationToken::new()).await.unwrap();

    assert_eq!(report.output, FormattedValue::Uint256(90));
    assert_eq!(report.confidence, 0.9);
    let chosen: Vec<_> = h
        .observer
        .events()
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::ConflictResolved { chosen, policy, .. } => Some((chosen, policy)),
            _ => None,
        })
        .collect();
    assert_eq!(chosen, vec![(Some(Arc::from("high")), "maxConfidence".to_string())]);
}

// ═══════════════════════════════════════════════════════════════
// MISSING-INPUT POLICY
// ═══════════════════════════════════════════════════════════════

fn partial_graph(allow_partial: bool) -> adcs::ValidatedGraph {
    let mut config = AdaptorConfig::new(AggregationMethod::Voting);
    if allow_partial {
        config = config.allowing_partial();
    }
    validated(|g| {
        for id in ["a", "b", "c"] {
            g.add_node(provider(id, OutputFormat::Bool)).unwrap();
        }
        g.add_node(Node::multi_input("vote", OutputFormat::Bool, ["a", "b", "c"], Transform::new(config)))
            .unwrap();
    })
}

fn partial_backends() -> Backends {
    Backends::new()
        .with_endpoint("a", fixed(json!(true), 0.9))
        .with_endpoint("b", broken("connection reset"))
        .with_endpoint("c", fixed(json!(true), 0.8))
}

#[tokio::test]
async fn test_failed_provider_without_tolerance_fails_invocation() {
    let h = harness(EngineConfig::default(), partial_backends());
    h.engine.register_graph("vote", partial_graph(false)).unwrap();

    let mut runner = h.engine.runner("vote", request()).unwrap();
    let err = runner.run(CancellationToken::new()).await.unwrap_err();

    assert_eq!(err.code(), "ADCS-041");
    assert_eq!(err.node_id(), Some("vote"));
    assert!(h.sink.is_empty());

    // trace survives the failure
    let trace = runner.trace();
    let b = trace.iter().find(|r| r.node_id.as_ref() == "b").unwrap();
    assert_eq!(b.error.as_ref().unwrap().code, "ADCS-030");
    let vote = trace.iter().find(|r| r.node_id.as_ref() == "vote").unwrap();
    assert_eq!(vote.error.as_ref().unwrap().code, "ADCS-041");
    assert!(runner
        .events()
        .iter()
        .any(|e| matches!(e.kind, EventKind::InvocationFailed { .. })));
}

#[tokio::test]
async fn test_failed_provider_with_tolerance_degrades_confidence() {
    let h = harness(EngineConfig::default(), partial_backends());
    h.engine.register_graph("vote", partial_graph(true)).unwrap();

    let report = h.engine.execute("vote", request(), CancellationToken::new()).await.unwrap();

    assert_eq!(report.output, FormattedValue::Bool(true));
    // unanimous among survivors, two of three present
    assert!((report.confidence - 2.0 / 3.0).abs() < 1e-9);
    let dropped = h
        .observer
        .events()
        .iter()
        .filter(|e| matches!(e.kind, EventKind::InputDropped { .. }))
        .count();
    assert_eq!(dropped, 1);
}

// ═══════════════════════════════════════════════════════════════
// CHAINS
// ═══════════════════════════════════════════════════════════════

fn pass(name: &str) -> ChainLink {
    ChainLink::new(
        name,
        OutputFormat::Bool,
        Transform::new(AdaptorConfig::new(AggregationMethod::FirstValid)),
    )
}

#[tokio::test]
async fn test_chain_failing_at_link_two_is_not_delivered() {
    let backends = Backends::new()
        .with_endpoint("src", fixed(json!(true), 0.9))
        .with_model("flaky", Arc::new(MockModel::failing("model overloaded")));
    let h = harness(EngineConfig::default(), backends);

    h.engine
        .register_graph(
            "chain",
            validated(|g| {
                g.add_node(provider("src", OutputFormat::Bool)).unwrap();
                g.add_node(Node::chained(
                    "pipeline",
                    OutputFormat::Bool,
                    "src",
                    vec![
                        pass("normalize"),
                        pass("screen"),
                        ChainLink::new(
                            "judge",
                            OutputFormat::Bool,
                            Transform::new(AdaptorConfig::new(AggregationMethod::LlmReasoning)).with_model("flaky"),
                        ),
                    ],
                ))
                .unwrap();
            }),
        )
        .unwrap();

    let err = h
        .engine
        .execute("chain", request(), CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        adcs::AdcsError::ChainLinkFailed { link_index, link, .. } => {
            assert_eq!(*link_index, 2);
            assert_eq!(link, "judge");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(err.root_cause().code(), "ADCS-031");
    assert!(h.sink.is_empty());

    let last_state = h
        .observer
        .events()
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::ChainTransition { state, .. } => Some(state),
            _ => None,
        })
        .last();
    assert_eq!(last_state.as_deref(), Some("failed(2)"));
}

#[tokio::test]
async fn test_chain_coerces_and_labels_score() {
    let backends = Backends::new().with_endpoint("raw", fixed(json!({"text": "composite", "value": 81}), 0.7));
    let h = harness(EngineConfig::default(), backends);

    let label = ChainLink::new(
        "label",
        OutputFormat::StringAndUint256,
        Transform::new(AdaptorConfig::new(AggregationMethod::FirstValid).with_score_bands(ScoreBands::new(30, 60))),
    )
    .with_input_format(OutputFormat::Uint256);

    h.engine
        .register_graph(
            "labels",
            validated(|g| {
                g.add_node(provider("raw", OutputFormat::StringAndUint256)).unwrap();
                g.add_node(Node::chained("grade", OutputFormat::StringAndUint256, "raw", vec![label]))
                    .unwrap();
            }),
        )
        .unwrap();

    let report = h.engine.execute("labels", request(), CancellationToken::new()).await.unwrap();

    // drop_text then label_score
    assert_eq!(report.output, FormattedValue::StringAndUint256("HIGH".into(), 81));
    let rules: Vec<String> = h
        .observer
        .events()
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::FormatConverted { rule, .. } => Some(rule),
            _ => None,
        })
        .collect();
    assert_eq!(rules, vec!["drop_text", "label_score"]);
}

// ═══════════════════════════════════════════════════════════════
// CORE MODEL
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_llm_reasoning_sees_static_context() {
    let judge = Arc::new(MockModel::answering(ModelResponse::structured(
        "sources disagree; defer to credit bureau",
        json!(false),
        0.66,
    )));
    let backends = Backends::new()
        .with_endpoint("a", fixed(json!(true), 0.9))
        .with_endpoint("b", fixed(json!(false), 0.8))
        .with_model("judge", judge.clone());
    let h = harness(EngineConfig::default(), backends);

    h.engine
        .register_graph(
            "judged",
            validated(|g| {
                g.add_node(provider("a", OutputFormat::Bool)).unwrap();
                g.add_node(provider("b", OutputFormat::Bool)).unwrap();
                g.add_node(Node::multi_input(
                    "judge",
                    OutputFormat::StringAndBool,
                    ["a", "b"],
                    Transform::new(AdaptorConfig::new(AggregationMethod::LlmReasoning))
                        .with_model("judge")
                        .with_context("Prefer the credit bureau"),
                ))
                .unwrap();
            }),
        )
        .unwrap();

    let report = h.engine.execute("judged", request(), CancellationToken::new()).await.unwrap();

    assert_eq!(
        report.output,
        FormattedValue::StringAndBool("sources disagree; defer to credit bureau".into(), false)
    );
    assert_eq!(report.confidence, 0.66);
    assert_eq!(judge.calls(), 1);
    assert_eq!(judge.last_request().unwrap().static_context, "Prefer the credit bureau");
}

#[tokio::test]
async fn test_undecodable_model_answer_is_tolerated_downstream() {
    let backends = Backends::new()
        .with_endpoint("a", fixed(json!(true), 0.9))
        .with_endpoint("b", fixed(json!(true), 0.8))
        .with_model("judge", model("I am not sure"));
    let h = harness(EngineConfig::default(), backends);

    h.engine
        .register_graph(
            "judged",
            validated(|g| {
                g.add_node(provider("a", OutputFormat::Bool)).unwrap();
                g.add_node(provider("b", OutputFormat::Bool)).unwrap();
                g.add_node(Node::single_input(
                    "llm",
                    OutputFormat::Bool,
                    "a",
                    Transform::new(AdaptorConfig::new(AggregationMethod::LlmReasoning)).with_model("judge"),
                ))
                .unwrap();
                g.add_node(Node::multi_input(
                    "vote",
                    OutputFormat::Bool,
                    ["llm", "b"],
                    Transform::new(AdaptorConfig::new(AggregationMethod::Voting).allowing_partial()),
                ))
                .unwrap();
            }),
        )
        .unwrap();

    let report = h.engine.execute("judged", request(), CancellationToken::new()).await.unwrap();

    assert_eq!(report.output, FormattedValue::Bool(true));
    assert!((report.confidence - 0.5).abs() < 1e-9);
    let llm = report.trace.iter().find(|r| r.node_id.as_ref() == "llm").unwrap();
    assert_eq!(llm.error.as_ref().unwrap().code, "ADCS-033");
}

#[tokio::test]
async fn test_single_input_explained_by_model() {
    let backends = Backends::new()
        .with_endpoint("score", fixed(json!(12), 0.95))
        .with_model("narrator", model("score is well below the risk floor"));
    let h = harness(EngineConfig::default(), backends);

    h.engine
        .register_graph(
            "explained",
            validated(|g| {
                g.add_node(provider("score", OutputFormat::Uint256)).unwrap();
                g.add_node(Node::single_input(
                    "explained",
                    OutputFormat::StringAndUint256,
                    "score",
                    Transform::new(AdaptorConfig::new(AggregationMethod::WeightedAverage)).with_model("narrator"),
                ))
                .unwrap();
            }),
        )
        .unwrap();

    let report = h.engine.execute("explained", request(), CancellationToken::new()).await.unwrap();

    assert_eq!(
        report.output,
        FormattedValue::StringAndUint256("score is well below the risk floor".into(), 12)
    );
}

// ═══════════════════════════════════════════════════════════════
// CATALOG + OBSERVABILITY
// ═══════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_unknown_graph() {
    let h = harness(EngineConfig::default(), Backends::new());
    let err = h
        .engine
        .execute("nope", request(), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ADCS-070");
}

#[test]
fn test_registration_checks_backends_and_duplicates() {
    let graph = validated(|g| {
        g.add_node(provider("a", OutputFormat::Bool)).unwrap();
    });

    let h = harness(EngineConfig::default(), Backends::new());
    let err = h.engine.register_graph("g", graph.clone()).unwrap_err();
    assert_eq!(err.code(), "ADCS-020");

    let h = harness(
        EngineConfig::default(),
        Backends::new().with_endpoint("a", fixed(json!(true), 1.0)),
    );
    h.engine.register_graph("g", graph.clone()).unwrap();
    let err = h.engine.register_graph("g", graph).unwrap_err();
    assert_eq!(err.code(), "ADCS-071");
    assert_eq!(h.engine.graph_ids(), vec![Arc::from("g")]);
}

#[tokio::test]
async fn test_trace_records_every_node() {
    let backends = Backends::new()
        .with_endpoint("a", fixed(json!(true), 0.9))
        .with_endpoint("b", fixed(json!(true), 0.7));
    let h = harness(EngineConfig::default(), backends);
    h.engine
        .register_graph(
            "and",
            validated(|g| {
                g.add_node(provider("a", OutputFormat::Bool)).unwrap();
                g.add_node(provider("b", OutputFormat::Bool)).unwrap();
                g.add_node(Node::multi_input(
                    "both",
                    OutputFormat::StringAndBool,
                    ["a", "b"],
                    Transform::new(AdaptorConfig::new(AggregationMethod::LogicalAnd)),
                ))
                .unwrap();
            }),
        )
        .unwrap();

    let report = h.engine.execute("and", request(), CancellationToken::new()).await.unwrap();

    assert_eq!(report.confidence, 0.7);
    let ids: Vec<&str> = report.trace.iter().map(|r| r.node_id.as_ref()).collect();
    assert_eq!(ids.len(), 3);
    assert_eq!(ids[2], "both");
    assert!(report.trace.iter().all(|r| r.is_success()));
    assert_eq!(report.trace[2].output, Some(report.output.to_json()));

    let kinds: Vec<&str> = ["invocation_started", "invocation_completed", "settlement_delivered"].to_vec();
    let json = h.observer.to_json();
    for kind in kinds {
        assert!(
            json.as_array().unwrap().iter().any(|e| e["kind"]["type"] == kind),
            "missing {kind}"
        );
    }
}

#[tokio::test]
async fn test_trace_outputs_can_be_disabled() {
    let backends = Backends::new().with_endpoint("a", fixed(json!(true), 0.9));
    let h = harness(EngineConfig::default().without_trace_outputs(), backends);
    h.engine
        .register_graph(
            "one",
            validated(|g| {
                g.add_node(provider("a", OutputFormat::Bool)).unwrap();
            }),
        )
        .unwrap();

    let report = h.engine.execute("one", request(), CancellationToken::new()).await.unwrap();
    assert_eq!(report.output, FormattedValue::Bool(true));
    assert_eq!(report.trace[0].output, None);
}

#[tokio::test]
async fn test_settlement_failure_surfaces() {
    let backends = Backends::new().with_endpoint("a", fixed(json!(true), 0.9));
    let engine = adcs::Engine::new(EngineConfig::default(), backends)
        .unwrap()
        .with_sink(Arc::new(adcs::CollectingSink::rejecting("callback reverted")));
    engine
        .register_graph(
            "one",
            validated(|g| {
                g.add_node(provider("a", OutputFormat::Bool)).unwrap();
            }),
        )
        .unwrap();

    let err = engine.execute("one", request(), CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.code(), "ADCS-080");
}
