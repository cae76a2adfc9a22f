// SPDX-License-Identifier: MIT

//! Node and router contracts
//!
//! A node reads the current state snapshot and returns a partial update.
//! A router reads the state after its source node merged and returns a
//! decision key for the conditional edge's table.

use async_trait::async_trait;
use std::error::Error;
use std::future::Future;

use super::state::{GraphState, StateUpdate};

/// Failure reported by a node callback
pub type NodeError = Box<dyn Error + Send + Sync>;

pub type NodeResult = Result<StateUpdate, NodeError>;

/// One step of a graph
#[async_trait]
pub trait Node: Send + Sync {
    /// Compute a partial update from the current state. Must not retain the borrow.
    async fn run(&self, state: &GraphState) -> NodeResult;

    /// Channels this node writes. Empty means the node does not declare them;
    /// non-empty lists are checked against the schema at compile time and
    /// enforced on every update.
    fn writes(&self) -> &[String] {
        &[]
    }
}

/// Decision callback for a conditional edge
pub trait Router: Send + Sync {
    fn route(&self, state: &GraphState) -> String;
}

impl<F> Router for F
where
    F: Fn(&GraphState) -> String + Send + Sync,
{
    fn route(&self, state: &GraphState) -> String {
        self(state)
    }
}

/// Pins a closure to the `Router` signature so argument lifetimes infer correctly
pub fn router_fn<F>(f: F) -> F
where
    F: Fn(&GraphState) -> String + Send + Sync,
{
    f
}

/// Node backed by an async closure receiving an owned snapshot
pub struct FnNode<F> {
    f: F,
    writes: Vec<String>,
}

/// Wrap an async closure as a [`Node`]
pub fn node_fn<F, Fut>(f: F) -> FnNode<F>
where
    F: Fn(GraphState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = NodeResult> + Send + 'static,
{
    FnNode {
        f,
        writes: Vec::new(),
    }
}

impl<F> FnNode<F> {
    /// Declare the channels this node writes
    pub fn with_writes<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.writes = channels.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl<F, Fut> Node for FnNode<F>
where
    F: Fn(GraphState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = NodeResult> + Send + 'static,
{
    async fn run(&self, state: &GraphState) -> NodeResult {
        (self.f)(state.clone()).await
    }

    fn writes(&self) -> &[String] {
        &self.writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::schema::{Channel, StateSchema};
    use serde_json::json;
    use std::sync::Arc;

    fn state() -> GraphState {
        let schema = StateSchema::new()
            .channel(Channel::new("n").with_default(json!(2)))
            .channel(Channel::new("doubled"));
        GraphState::seeded(Arc::new(schema))
    }

    #[tokio::test]
    async fn test_fn_node_returns_update() {
        let node = node_fn(|state: GraphState| async move {
            let n = state.get("n").and_then(|v| v.as_i64()).unwrap_or_default();
            Ok(StateUpdate::new().set("doubled", n * 2))
        })
        .with_writes(["doubled"]);

        let update = node.run(&state()).await.unwrap();
        assert_eq!(update.get("doubled"), Some(&json!(4)));
        assert_eq!(node.writes(), &["doubled".to_string()]);
    }

    #[tokio::test]
    async fn test_fn_node_error() {
        let node = node_fn(|_state: GraphState| async move {
            Err::<StateUpdate, NodeError>("upstream unavailable".into())
        });

        let err = node.run(&state()).await.unwrap_err();
        assert_eq!(err.to_string(), "upstream unavailable");
        assert!(node.writes().is_empty());
    }

    #[test]
    fn test_closure_router() {
        let router = router_fn(|state: &GraphState| {
            if state.get("n") == Some(&json!(2)) {
                "two".to_string()
            } else {
                "other".to_string()
            }
        });
        assert_eq!(router.route(&state()), "two");
    }
}
