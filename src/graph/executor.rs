// SPDX-License-Identifier: MIT

//! Graph executor
//!
//! Runs a `CompiledGraph` against one input. Each step invokes exactly one
//! node, merges its update and resolves the next node; there is no
//! intra-run parallelism. Between steps the run checks, in order,
//! cancellation, the run deadline and the step limit.

use chrono::Utc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::compiler::{CompiledGraph, CompiledNode, Route, Target};
use super::error::{RunError, RunErrorKind};
use super::event::RunEvent;
use super::state::{GraphState, StateUpdate};
use super::START;

/// Multiplied by the node count to get the default step limit
pub const DEFAULT_STEPS_PER_NODE: usize = 25;

/// Per-run settings
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Overrides the graph's step limit
    pub max_steps: Option<usize>,
    /// Deadline for the whole run
    pub timeout: Option<Duration>,
    /// Deadline for each node callback
    pub step_timeout: Option<Duration>,
    /// Checked between steps; an in-flight callback is not interrupted
    pub cancel: Option<CancellationToken>,
    /// Progress events. A full channel holds the run back until the run
    /// deadline or cancellation, after which the event is dropped.
    pub events: Option<mpsc::Sender<RunEvent>>,
}

impl RunOptions {
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_events(mut self, tx: mpsc::Sender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }
}

struct RunContext {
    run_id: Uuid,
    steps: usize,
    max_steps: usize,
    deadline: Option<Instant>,
    step_timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
    events: Option<mpsc::Sender<RunEvent>>,
}

impl RunContext {
    async fn emit<F>(&self, event: F)
    where
        F: FnOnce() -> RunEvent,
    {
        let Some(tx) = &self.events else {
            return;
        };
        // a dropped receiver only means nobody is listening
        let send = tx.send(event());
        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, send).await.is_ok(),
                None => {
                    let _ = send.await;
                    true
                }
            }
        };
        let delivered = match &self.cancel {
            Some(token) => tokio::select! {
                biased;
                delivered = bounded => delivered,
                _ = token.cancelled() => false,
            },
            None => bounded.await,
        };
        if !delivered {
            log::debug!("Run {} dropped an event: receiver is full", self.run_id);
        }
    }

    fn interruption(&self) -> Option<RunErrorKind> {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return Some(RunErrorKind::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(RunErrorKind::DeadlineExceeded { node: None });
        }
        if self.steps >= self.max_steps {
            return Some(RunErrorKind::StepLimitExceeded {
                limit: self.max_steps,
            });
        }
        None
    }

    /// Time the next callback may take: the tighter of the step timeout and the run deadline
    fn step_budget(&self) -> Option<Duration> {
        let remaining = self
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()));
        match (remaining, self.step_timeout) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    async fn fail(&self, kind: RunErrorKind, state: GraphState) -> RunError {
        log::error!(
            "Run {} failed after {} step(s): {}",
            self.run_id,
            self.steps,
            kind
        );
        self.emit(|| RunEvent::RunFailed {
            run_id: self.run_id,
            steps: self.steps,
            error: kind.to_string(),
            state: state.to_json(),
            at: Utc::now(),
        })
        .await;
        RunError {
            run_id: self.run_id,
            steps: self.steps,
            kind,
            state,
        }
    }
}

impl CompiledGraph {
    /// Steps a run may take before failing with `StepLimitExceeded`
    pub fn step_limit(&self) -> usize {
        self.config
            .max_steps
            .unwrap_or_else(|| self.nodes.len().max(1) * DEFAULT_STEPS_PER_NODE)
    }

    /// Run once with default options
    pub async fn invoke(&self, input: StateUpdate) -> Result<GraphState, RunError> {
        self.invoke_with(input, RunOptions::default()).await
    }

    /// Run once. On failure the error carries the last fully-merged state.
    pub async fn invoke_with(
        &self,
        input: StateUpdate,
        options: RunOptions,
    ) -> Result<GraphState, RunError> {
        let mut ctx = RunContext {
            run_id: Uuid::new_v4(),
            steps: 0,
            max_steps: options.max_steps.unwrap_or_else(|| self.step_limit()),
            deadline: options.timeout.map(|t| Instant::now() + t),
            step_timeout: options.step_timeout,
            cancel: options.cancel,
            events: options.events,
        };

        let mut state = match GraphState::initialize(self.schema.clone(), input) {
            Ok(state) => state,
            Err(e) => {
                let seeded = GraphState::seeded(self.schema.clone());
                return Err(ctx.fail(e.into(), seeded).await);
            }
        };

        log::info!(
            "Run {} started (step limit {})",
            ctx.run_id,
            ctx.max_steps
        );
        ctx.emit(|| RunEvent::RunStarted {
            run_id: ctx.run_id,
            at: Utc::now(),
        })
        .await;

        let mut target = match self.next_target(&self.entry, START, &state, &ctx).await {
            Ok(target) => target,
            Err(kind) => return Err(ctx.fail(kind, state).await),
        };

        while let Target::Node(index) = target {
            if let Some(kind) = ctx.interruption() {
                return Err(ctx.fail(kind, state).await);
            }

            let node = &self.nodes[index];
            ctx.steps += 1;
            let step = ctx.steps;
            let started = Instant::now();

            log::info!("Run {} step {}: executing node {}", ctx.run_id, step, node.name);
            ctx.emit(|| RunEvent::NodeStarted {
                run_id: ctx.run_id,
                step,
                node: node.name.clone(),
                at: Utc::now(),
            })
            .await;

            let update = match self.run_node(node, &state, &ctx).await {
                Ok(update) => update,
                Err(kind) => return Err(ctx.fail(kind, state).await),
            };
            let channels: Vec<String> = update.channels().cloned().collect();

            state = match state.merged(update) {
                Ok(next) => next,
                Err(e) => return Err(ctx.fail(e.into(), state).await),
            };

            let elapsed_ms = started.elapsed().as_millis() as u64;
            log::info!(
                "Node {} completed in {}ms, wrote {:?}",
                node.name,
                elapsed_ms,
                channels
            );
            ctx.emit(|| RunEvent::NodeCompleted {
                run_id: ctx.run_id,
                step,
                node: node.name.clone(),
                channels,
                elapsed_ms,
                at: Utc::now(),
            })
            .await;

            target = match self.next_target(&node.route, &node.name, &state, &ctx).await {
                Ok(target) => target,
                Err(kind) => return Err(ctx.fail(kind, state).await),
            };
        }

        log::info!("Run {} completed in {} step(s)", ctx.run_id, ctx.steps);
        ctx.emit(|| RunEvent::RunCompleted {
            run_id: ctx.run_id,
            steps: ctx.steps,
            state: state.to_json(),
            at: Utc::now(),
        })
        .await;

        Ok(state)
    }

    async fn run_node(
        &self,
        node: &CompiledNode,
        state: &GraphState,
        ctx: &RunContext,
    ) -> Result<StateUpdate, RunErrorKind> {
        let call = node.node.run(state);
        let result = match ctx.step_budget() {
            Some(budget) => tokio::time::timeout(budget, call).await.map_err(|_| {
                RunErrorKind::DeadlineExceeded {
                    node: Some(node.name.clone()),
                }
            })?,
            None => call.await,
        };

        let update = result.map_err(|source| RunErrorKind::Node {
            node: node.name.clone(),
            source,
        })?;

        if !node.writes.is_empty() {
            if let Some(channel) = update.channels().find(|c| !node.writes.contains(*c)) {
                return Err(RunErrorKind::UndeclaredWrite {
                    node: node.name.clone(),
                    channel: channel.clone(),
                });
            }
        }

        Ok(update)
    }

    /// Resolve the route leaving `from` against the post-merge state
    async fn next_target(
        &self,
        route: &Route,
        from: &str,
        state: &GraphState,
        ctx: &RunContext,
    ) -> Result<Target, RunErrorKind> {
        let (target, key) = match route {
            Route::Direct(target) => (*target, None),
            Route::Branch { router, table } => {
                let key = router.route(state);
                let target = *table.get(&key).ok_or_else(|| RunErrorKind::UnresolvedBranch {
                    node: from.to_string(),
                    key: key.clone(),
                })?;
                (target, Some(key))
            }
        };

        let to = self.target_name(target);
        match &key {
            Some(key) => log::debug!("Route {} -[{}]-> {}", from, key, to),
            None => log::debug!("Route {} -> {}", from, to),
        }
        ctx.emit(|| RunEvent::Routed {
            run_id: ctx.run_id,
            from: from.to_string(),
            key,
            to: to.to_string(),
            at: Utc::now(),
        })
        .await;

        Ok(target)
    }
}
