use anyhow::Result;
use futures::future::BoxFuture;
use ruleflow::prelude::*;
use ruleflow::{ChoiceBranchMap, EntryNodeError, CHOICE_COMPONENT};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Invocation counts per node id.
#[derive(Clone, Default)]
struct Calls(Arc<Mutex<HashMap<String, usize>>>);

impl Calls {
    fn count(&self, id: &str) -> usize {
        self.0.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    fn total(&self) -> usize {
        self.0.lock().unwrap().values().sum()
    }
}

fn compiler(calls: &Calls) -> ComponentRegistry {
    let counted = calls.clone();
    let failing = calls.clone();
    ComponentRegistry::new()
        .register("step", move |node: &NodeRecord| {
            let calls = counted.clone();
            let id = node.id.clone();
            Ok(action_fn(move |ctx| {
                *calls.0.lock().unwrap().entry(id.clone()).or_default() += 1;
                ctx.set_property(format!("from_{id}"), "1");
                Ok(())
            }))
        })
        .register("explode", move |node: &NodeRecord| {
            let calls = failing.clone();
            let id = node.id.clone();
            Ok(action_fn(move |_ctx| {
                *calls.0.lock().unwrap().entry(id.clone()).or_default() += 1;
                anyhow::bail!("{id} exploded")
            }))
        })
}

fn step(id: &str) -> NodeRecord {
    NodeRecord::new(id, "step")
}

fn edge(source: &str, target: &str) -> EdgeRecord {
    EdgeRecord::new(source, target)
}

fn context() -> RuleContext {
    RuleContext::new_with_context_id("ctx42".into(), json!({"amount": 120}))
}

#[tokio::test]
async fn test_build_requires_exactly_one_entry() -> Result<()> {
    let calls = Calls::default();
    let compiler = compiler(&calls);

    assert!(FlowGraph::build("one", vec![step("A"), step("B")], vec![edge("A", "B")], &compiler).is_ok());

    let none = FlowGraph::build(
        "none",
        vec![step("A"), step("B")],
        vec![edge("A", "B"), edge("B", "A")],
        &compiler,
    )
    .unwrap_err();
    assert!(matches!(
        none,
        RuleFlowError::EntryNode {
            source: EntryNodeError::Missing,
            ..
        }
    ));

    let many = FlowGraph::build("many", vec![step("A"), step("B")], vec![], &compiler).unwrap_err();
    assert!(matches!(
        many,
        RuleFlowError::EntryNode {
            source: EntryNodeError::Ambiguous(_),
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn test_linear_chain_visits_in_order() -> Result<()> {
    let order = Arc::new(Mutex::new(Vec::new()));
    let seen = order.clone();
    let compiler = ComponentRegistry::new().register("step", move |node: &NodeRecord| {
        let seen = seen.clone();
        let id = node.id.clone();
        Ok(action_fn(move |ctx| {
            seen.lock().unwrap().push((id.clone(), ctx.trace_path.clone()));
            Ok(())
        }))
    });
    let graph = Arc::new(FlowGraph::build(
        "linear",
        vec![step("A"), step("B"), step("C")],
        vec![edge("A", "B"), edge("B", "C")],
        &compiler,
    )?);

    let ctx = GraphProcessor::new().process(&graph, context()).await?;

    assert_eq!(
        *order.lock().unwrap(),
        vec![
            ("A".to_string(), "ctx42".to_string()),
            ("B".to_string(), "ctx42-A".to_string()),
            ("C".to_string(), "ctx42-A-B".to_string()),
        ]
    );
    assert_eq!(ctx.trace_path, "ctx42-A-B");
    Ok(())
}

struct Delayed {
    delay: Duration,
    key: &'static str,
    done: Arc<AtomicUsize>,
}

impl NodeAction for Delayed {
    fn execute<'a>(&'a self, ctx: &'a mut RuleContext) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.done.fetch_add(1, Ordering::SeqCst);
            ctx.set_property(self.key, "done");
            Ok(())
        })
    }
}

#[tokio::test]
async fn test_fan_out_waits_for_every_branch() -> Result<()> {
    let calls = Calls::default();
    let done = Arc::new(AtomicUsize::new(0));
    let compiler = compiler(&calls)
        .register_action(
            "slow",
            Arc::new(Delayed {
                delay: Duration::from_millis(80),
                key: "slow_branch",
                done: done.clone(),
            }),
        )
        .register_action(
            "fast",
            Arc::new(Delayed {
                delay: Duration::from_millis(1),
                key: "fast_branch",
                done: done.clone(),
            }),
        );
    let graph = Arc::new(FlowGraph::build(
        "fan-out",
        vec![
            step("A"),
            NodeRecord::new("B", "slow"),
            NodeRecord::new("C", "fast"),
        ],
        vec![edge("A", "B"), edge("A", "C")],
        &compiler,
    )?);

    let ctx = GraphProcessor::new().process(&graph, context()).await?;

    assert_eq!(done.load(Ordering::SeqCst), 2);
    assert_eq!(ctx.property("slow_branch"), Some("done"));
    assert_eq!(ctx.property("fast_branch"), Some("done"));
    assert_eq!(calls.count("A"), 1);
    Ok(())
}

#[tokio::test]
async fn test_choice_takes_first_matching_branch() -> Result<()> {
    let calls = Calls::default();
    let choice = ChoiceExecutor::new()
        .when("L1", |_: &RuleContext| Ok::<_, anyhow::Error>(false))
        .when("L2", |_: &RuleContext| Ok::<_, anyhow::Error>(true))
        .when("L3", |_: &RuleContext| Ok::<_, anyhow::Error>(true))
        .otherwise("LO");
    let base = compiler(&calls);
    let compiler = move |node: &NodeRecord| -> anyhow::Result<NodeExecutor> {
        if node.id == "choose" {
            return Ok(NodeExecutor::choice(choice.clone()));
        }
        base.compile(node)
    };
    let graph = Arc::new(FlowGraph::build(
        "choice",
        vec![
            step("A"),
            step("choose"),
            step("one"),
            step("two"),
            step("three"),
            step("other"),
        ],
        vec![
            edge("A", "choose"),
            edge("choose", "one").on_branch("L1"),
            edge("choose", "two").on_branch("L2"),
            edge("choose", "three").on_branch("L3"),
            edge("choose", "other").on_branch("LO"),
        ],
        &compiler,
    )?);

    GraphProcessor::new().process(&graph, context()).await?;

    assert_eq!(calls.count("two"), 1);
    assert_eq!(calls.count("one") + calls.count("three") + calls.count("other"), 0);
    Ok(())
}

#[tokio::test]
async fn test_choice_with_empty_otherwise_stops_quietly() -> Result<()> {
    let calls = Calls::default();
    let graph = Arc::new(FlowGraph::build(
        "dead-end",
        vec![
            step("A"),
            NodeRecord::new("route", CHOICE_COMPONENT)
                .with_parameter("when", json!([{"id": "big", "condition": "${body.amount} > 1000"}]))
                .with_parameter("otherwise", json!("")),
            step("big_order"),
        ],
        vec![edge("A", "route"), edge("route", "big_order").on_branch("big")],
        &compiler(&calls),
    )?);

    let ctx = GraphProcessor::new().process(&graph, context()).await?;

    assert!(!ctx.has_error());
    assert_eq!(calls.count("big_order"), 0);
    Ok(())
}

#[tokio::test]
async fn test_failing_node_stops_its_path() -> Result<()> {
    let calls = Calls::default();
    let graph = Arc::new(FlowGraph::build(
        "failing",
        vec![step("A"), NodeRecord::new("B", "explode"), step("C")],
        vec![edge("A", "B"), edge("B", "C")],
        &compiler(&calls),
    )?);
    let mut slot_was_set = false;

    let err = GraphProcessor::new()
        .process_with(&graph, context(), |ctx, _| slot_was_set = ctx.has_error())
        .await
        .unwrap_err();

    assert!(matches!(err, RuleFlowError::NodeExecution { .. }));
    assert_eq!(err.node_id(), Some("B"));
    assert!(slot_was_set);
    assert_eq!(calls.count("B"), 1);
    assert_eq!(calls.count("C"), 0);
    Ok(())
}

#[tokio::test]
async fn test_output_node_runs_once_after_join() -> Result<()> {
    let calls = Calls::default();
    let graph = Arc::new(FlowGraph::build(
        "output",
        vec![
            step("A"),
            step("B"),
            step("C"),
            step("D"),
            step("out").as_output(),
        ],
        vec![
            edge("A", "B"),
            edge("A", "C"),
            edge("A", "D"),
            edge("B", "out"),
            edge("C", "out"),
            edge("D", "out"),
        ],
        &compiler(&calls),
    )?);

    let ctx = GraphProcessor::new().process(&graph, context()).await?;

    assert_eq!(calls.count("out"), 1);
    assert_eq!(calls.total(), 5);
    assert!(ctx.reached_output());
    assert_eq!(ctx.visited_nodes().last(), Some(&"out"));
    Ok(())
}

#[tokio::test]
async fn test_rebuild_is_deterministic() -> Result<()> {
    let calls = Calls::default();
    let nodes = vec![
        step("A"),
        step("route"),
        step("x"),
        step("y"),
        step("z"),
    ];
    let edges = vec![
        edge("A", "route"),
        edge("A", "z"),
        edge("route", "x").on_branch("left"),
        edge("route", "y").on_branch("right"),
        edge("route", "z").on_branch("right"),
        edge("x", "z"),
    ];

    let first = FlowGraph::build("det", nodes.clone(), edges.clone(), &compiler(&calls))?;
    let second = FlowGraph::build("det", nodes, edges, &compiler(&calls))?;

    for id in first.graph().nodes() {
        assert_eq!(first.successors(id), second.successors(id));
    }
    let branches: &ChoiceBranchMap = first.branches();
    assert_eq!(branches, second.branches());
    assert_eq!(branches.targets("right"), ["y", "z"]);
    Ok(())
}

#[tokio::test]
async fn test_parallel_properties_all_survive() -> Result<()> {
    let calls = Calls::default();
    let graph = Arc::new(FlowGraph::build(
        "merge",
        vec![step("A"), step("B"), step("C"), step("D")],
        vec![edge("A", "B"), edge("A", "C"), edge("A", "D")],
        &compiler(&calls),
    )?);
    let properties = HashMap::from([("caller".to_string(), "test".to_string())]);

    let outcome = GraphProcessor::new()
        .run(&graph, json!({"amount": 1}), properties)
        .await;

    let (body, properties) = outcome.into_result()?;
    assert_eq!(body, json!({"amount": 1}));
    for key in ["caller", "from_A", "from_B", "from_C", "from_D"] {
        assert!(properties.contains_key(key), "missing {key}");
    }
    Ok(())
}
