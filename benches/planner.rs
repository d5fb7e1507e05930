//! Benchmark: Graph validation and planning
//!
//! Measures AdaptorGraph validation (shape, cycles, formats, plan) and bare
//! Kahn planning.
//! Run: cargo bench --bench planner

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use adcs::dag::plan;
use adcs::{AdaptorConfig, AdaptorGraph, AggregationMethod, Node, OutputFormat, Transform};

fn pass() -> Transform {
    Transform::new(AdaptorConfig::new(AggregationMethod::FirstValid))
}

/// Provider followed by a linear run of single-input adaptors
fn generate_linear_graph(size: usize) -> AdaptorGraph {
    let mut graph = AdaptorGraph::new();
    graph
        .add_node(Node::provider("node_0", OutputFormat::Bool, "oracle", "m"))
        .unwrap();
    for i in 1..size {
        graph
            .add_node(Node::single_input(
                format!("node_{i}"),
                OutputFormat::Bool,
                format!("node_{}", i - 1),
                pass(),
            ))
            .unwrap();
    }
    graph
}

/// `width` providers feeding one voting adaptor
fn generate_fan_in_graph(width: usize) -> AdaptorGraph {
    let mut graph = AdaptorGraph::new();
    let ids: Vec<String> = (0..width).map(|i| format!("provider_{i}")).collect();
    for id in &ids {
        graph
            .add_node(Node::provider(id.as_str(), OutputFormat::Bool, "oracle", "m"))
            .unwrap();
    }
    graph
        .add_node(Node::multi_input(
            "vote",
            OutputFormat::Bool,
            ids,
            Transform::new(AdaptorConfig::new(AggregationMethod::Voting)),
        ))
        .unwrap();
    graph
}

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    for size in [10, 100, 1000] {
        let graph = generate_linear_graph(size);
        group.bench_with_input(BenchmarkId::new("linear", size), &graph, |b, graph| {
            b.iter(|| black_box(graph.clone().validate().unwrap()))
        });
    }

    for width in [4, 32, 256] {
        let graph = generate_fan_in_graph(width);
        group.bench_with_input(BenchmarkId::new("fan_in", width), &graph, |b, graph| {
            b.iter(|| black_box(graph.clone().validate().unwrap()))
        });
    }

    group.finish();
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");

    for size in [10, 100, 1000] {
        let graph = generate_linear_graph(size);
        group.bench_with_input(BenchmarkId::new("linear", size), &graph, |b, graph| {
            b.iter(|| black_box(plan(graph).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_validate, bench_plan);
criterion_main!(benches);
