//! Engine behaviour through the public API: definition, compilation and runs

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use tripgraph::graph::{
    node_fn, router_fn, Channel, GraphConfig, GraphError, GraphState, Node, Reducer,
    RunErrorKind, RunEvent, RunOptions, StateGraph, StateSchema, StateUpdate, END, START,
};

fn counting_schema() -> StateSchema {
    StateSchema::from_yaml(
        r#"
        count:
          type: number
          default: 0
        visits:
          type: array
          reducer: append
        note:
          type: string
        "#,
    )
    .unwrap()
}

fn increment(name: &'static str) -> impl Node {
    node_fn(move |state: GraphState| async move {
        let count = state.get("count").and_then(Value::as_i64).unwrap_or_default();
        Ok(StateUpdate::new()
            .set("count", count + 1)
            .set("visits", name))
    })
    .with_writes(["count", "visits"])
}

/// START -> tick -> (count < limit ? tick : END)
fn loop_until(limit: i64) -> StateGraph {
    let mut graph = StateGraph::new(counting_schema());
    graph
        .add_node("tick", increment("tick"))
        .and_then(|g| g.add_edge(START, "tick"))
        .and_then(|g| {
            g.add_conditional_edges(
                "tick",
                router_fn(move |state: &GraphState| {
                    let count = state.get("count").and_then(Value::as_i64).unwrap_or_default();
                    let key = if count < limit { "again" } else { "done" };
                    key.to_string()
                }),
                [("again", "tick"), ("done", END)],
            )
        })
        .unwrap();
    graph
}

#[tokio::test]
async fn test_cycle_with_exit_terminates() {
    let graph = loop_until(4).compile().unwrap();
    let state = graph.invoke(StateUpdate::new()).await.unwrap();

    assert_eq!(state.get("count"), Some(&json!(4)));
    assert_eq!(state.get("visits"), Some(&json!(["tick", "tick", "tick", "tick"])));
}

#[tokio::test]
async fn test_cycle_bounded_by_step_limit() {
    let graph = loop_until(1_000).compile().unwrap();
    assert_eq!(graph.step_limit(), 25);

    let err = graph.invoke(StateUpdate::new()).await.unwrap_err();
    assert!(matches!(err.kind(), RunErrorKind::StepLimitExceeded { limit: 25 }));
    assert_eq!(err.last_state().get("count"), Some(&json!(25)));
}

#[tokio::test]
async fn test_input_overlays_defaults() {
    let graph = loop_until(3).compile().unwrap();
    let state = graph
        .invoke(StateUpdate::new().set("count", 2).set("note", "resumed"))
        .await
        .unwrap();

    assert_eq!(state.get("count"), Some(&json!(3)));
    assert_eq!(state.get_str("note"), Some("resumed"));
    assert_eq!(state.get("visits"), Some(&json!(["tick"])));
}

#[tokio::test]
async fn test_typed_channel_rejects_bad_update() {
    let mut graph = StateGraph::new(counting_schema());
    graph
        .add_node(
            "bad",
            node_fn(|_state: GraphState| async move { Ok(StateUpdate::new().set("note", 7)) }),
        )
        .and_then(|g| g.add_edge(START, "bad"))
        .and_then(|g| g.add_edge("bad", END))
        .unwrap();

    let err = graph.compile().unwrap().invoke(StateUpdate::new()).await.unwrap_err();
    assert!(matches!(err.kind(), RunErrorKind::TypeMismatch { channel, .. } if channel == "note"));
}

#[tokio::test]
async fn test_custom_reducer_accumulates() {
    let schema = StateSchema::new().channel(
        Channel::new("total")
            .with_default(json!(0))
            .with_reducer(Reducer::custom(|current, update| {
                let current = current.and_then(Value::as_i64).unwrap_or_default();
                json!(current + update.as_i64().unwrap_or_default())
            })),
    );

    let add = |n: i64| node_fn(move |_state: GraphState| async move { Ok(StateUpdate::new().set("total", n)) });

    let mut graph = StateGraph::new(schema);
    graph
        .add_node("five", add(5))
        .and_then(|g| g.add_node("seven", add(7)))
        .and_then(|g| g.add_edge(START, "five"))
        .and_then(|g| g.add_edge("five", "seven"))
        .and_then(|g| g.add_edge("seven", END))
        .unwrap();

    let state = graph.compile().unwrap().invoke(StateUpdate::new()).await.unwrap();
    assert_eq!(state.get("total"), Some(&json!(12)));
}

#[tokio::test]
async fn test_shared_node_instance() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let shared: Arc<dyn Node> = Arc::new(node_fn(move |_state: GraphState| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { Ok(StateUpdate::new().set("visits", "shared")) }
    }));

    let mut graph = StateGraph::new(counting_schema());
    graph
        .add_shared_node("first", shared.clone())
        .and_then(|g| g.add_shared_node("second", shared))
        .and_then(|g| g.add_edge(START, "first"))
        .and_then(|g| g.add_edge("first", "second"))
        .and_then(|g| g.add_edge("second", END))
        .unwrap();

    let state = graph.compile().unwrap().invoke(StateUpdate::new()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(state.get("visits"), Some(&json!(["shared", "shared"])));
}

#[test]
fn test_compile_errors() {
    let mut graph = StateGraph::new(counting_schema());
    graph
        .add_node("tick", increment("tick"))
        .and_then(|g| g.add_edge(START, "tock"))
        .and_then(|g| g.add_edge("tick", END))
        .unwrap();
    assert!(matches!(
        graph.compile().err(),
        Some(GraphError::UnknownNodeReference { name, .. }) if name == "tock"
    ));

    let mut graph = StateGraph::new(StateSchema::new());
    graph
        .add_node("tick", increment("tick"))
        .and_then(|g| g.add_edge(START, "tick"))
        .and_then(|g| g.add_edge("tick", END))
        .unwrap();
    assert!(matches!(
        graph.compile().err(),
        Some(GraphError::UnknownChannel { channel, .. }) if channel == "count"
    ));
}

#[test]
fn test_lenient_mode_keeps_unreachable_node() {
    let build = || {
        let mut graph = loop_until(2);
        graph
            .add_node("island", increment("island"))
            .and_then(|g| g.add_edge("island", END))
            .unwrap();
        graph
    };

    assert_eq!(
        build().compile().err(),
        Some(GraphError::UnreachableNode(vec!["island".to_string()]))
    );
    let graph = build().compile_with(GraphConfig::default().lenient()).unwrap();
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.step_limit(), 50);
}

#[tokio::test]
async fn test_cancelled_before_first_step() {
    let token = CancellationToken::new();
    token.cancel();

    let err = loop_until(3)
        .compile()
        .unwrap()
        .invoke_with(StateUpdate::new(), RunOptions::default().with_cancellation(token))
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(err.steps, 0);
    assert_eq!(err.into_state().get("count"), Some(&json!(0)));
}

#[tokio::test]
async fn test_run_timeout_during_slow_node() {
    let mut graph = StateGraph::new(counting_schema());
    graph
        .add_node("tick", increment("tick"))
        .and_then(|g| {
            g.add_node(
                "stall",
                node_fn(|_state: GraphState| async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(StateUpdate::new())
                }),
            )
        })
        .and_then(|g| g.add_edge(START, "tick"))
        .and_then(|g| g.add_edge("tick", "stall"))
        .and_then(|g| g.add_edge("stall", END))
        .unwrap();

    let err = graph
        .compile()
        .unwrap()
        .invoke_with(
            StateUpdate::new(),
            RunOptions::default().with_timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err.kind(),
        RunErrorKind::DeadlineExceeded { node: Some(n) } if n == "stall"
    ));
    assert_eq!(err.last_state().get("count"), Some(&json!(1)));
}

#[tokio::test]
async fn test_failure_event_is_terminal() {
    let (tx, mut rx) = mpsc::channel(64);
    let graph = loop_until(1_000).compile_with(GraphConfig::default().with_max_steps(2)).unwrap();
    let err = graph
        .invoke_with(StateUpdate::new(), RunOptions::default().with_events(tx))
        .await
        .unwrap_err();

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert!(events.iter().all(|e| e.run_id() == err.run_id));
    let last = events.last().unwrap();
    assert!(last.is_terminal());
    match last {
        RunEvent::RunFailed { steps, error, state, .. } => {
            assert_eq!(*steps, 2);
            assert_eq!(error, "step limit of 2 exceeded");
            assert_eq!(state["count"], json!(2));
        }
        other => panic!("unexpected terminal event: {:?}", other),
    }

    let routed: Vec<Option<String>> = events
        .iter()
        .filter_map(|e| match e {
            RunEvent::Routed { key, .. } => Some(key.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(routed, vec![None, Some("again".to_string()), Some("again".to_string())]);
}
