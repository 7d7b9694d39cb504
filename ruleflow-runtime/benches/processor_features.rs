use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ruleflow_context::RuleContext;
use ruleflow_core::{action_fn, ComponentRegistry, EdgeRecord, FlowGraph, NodeRecord};
use ruleflow_runtime::GraphProcessor;
use serde_json::json;
use std::sync::Arc;

fn compiler() -> ComponentRegistry {
    ComponentRegistry::new().register_action(
        "touch",
        action_fn(|ctx| {
            ctx.set_property("touched", "yes");
            Ok(())
        }),
    )
}

/// `start -> n0 -> n1 -> ...` when `fan_out` is false, otherwise
/// `start -> {n0, n1, ...}`.
fn build_graph(fan_out: bool, nodes: usize) -> Arc<FlowGraph> {
    let mut records = vec![NodeRecord::new("start", "touch")];
    let mut edges = Vec::with_capacity(nodes);
    for i in 0..nodes {
        records.push(NodeRecord::new(format!("n{i}"), "touch"));
        let source = if fan_out || i == 0 {
            "start".to_string()
        } else {
            format!("n{}", i - 1)
        };
        edges.push(EdgeRecord::new(source, format!("n{i}")));
    }

    Arc::new(FlowGraph::build("bench", records, edges, &compiler()).unwrap())
}

fn bench_processor(c: &mut Criterion) {
    let mut group = c.benchmark_group("processor_features");

    for &nodes in &[10usize, 50] {
        // baseline: linear chain
        let chain = build_graph(false, nodes);
        group.bench_function(format!("chain_{nodes}"), |b| {
            b.to_async(tokio::runtime::Runtime::new().unwrap()).iter(|| {
                let graph = chain.clone();
                async move {
                    let processor = GraphProcessor::new();
                    let ctx = RuleContext::new(json!({"n": nodes}));
                    black_box(processor.process(&graph, ctx).await.unwrap());
                }
            });
        });

        let fan = build_graph(true, nodes);
        group.bench_function(format!("fan_out_{nodes}"), |b| {
            b.to_async(tokio::runtime::Runtime::new().unwrap()).iter(|| {
                let graph = fan.clone();
                async move {
                    let processor = GraphProcessor::new();
                    let ctx = RuleContext::new(json!({"n": nodes}));
                    black_box(processor.process(&graph, ctx).await.unwrap());
                }
            });
        });
    }
    group.finish();
}

criterion_group!(name=benches; config=Criterion::default(); targets=bench_processor);
criterion_main!(benches);
