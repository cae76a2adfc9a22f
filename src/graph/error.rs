// SPDX-License-Identifier: MIT

//! Graph construction and run errors
//!
//! Construction errors (`GraphError`) are raised while defining or compiling
//! a graph and never during a run. Run errors (`RunError`) abort a single run
//! and always carry the last fully-merged state for diagnostics.

use thiserror::Error;
use uuid::Uuid;

use super::node::NodeError;
use super::schema::FieldType;
use super::state::GraphState;

/// Errors raised while building or compiling a graph
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A node with this name was already registered
    #[error("duplicate node '{0}'")]
    DuplicateNode(String),

    /// START and END cannot be registered as nodes
    #[error("'{0}' is a reserved node name")]
    ReservedName(String),

    /// Registered nodes that cannot be reached from START
    #[error("unreachable node(s): {}", .0.join(", "))]
    UnreachableNode(Vec<String>),

    /// An edge source, edge destination or decision-table value names no registered node
    #[error("edge {edge} references unknown node '{name}'")]
    UnknownNodeReference { edge: String, name: String },

    /// Structural problems: missing START route, routes out of END, double routes
    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    /// A node declares a write to a channel the schema does not have
    #[error("node '{node}' writes undeclared channel '{channel}'")]
    UnknownChannel { node: String, channel: String },
}

/// Errors from seeding or merging state
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    #[error("channel '{channel}' expects a {expected} value")]
    TypeMismatch { channel: String, expected: FieldType },
}

/// Why a run was aborted
#[derive(Debug, Error)]
pub enum RunErrorKind {
    /// Input or update named a channel the schema does not declare
    #[error("unknown channel '{0}'")]
    UnknownChannel(String),

    /// A merged value does not match the channel's declared type
    #[error("channel '{channel}' expects a {expected} value")]
    TypeMismatch { channel: String, expected: FieldType },

    /// A node wrote a channel outside the set it declared
    #[error("node '{node}' wrote channel '{channel}' it does not declare")]
    UndeclaredWrite { node: String, channel: String },

    /// The node callback itself failed
    #[error("node '{node}' failed: {source}")]
    Node { node: String, source: NodeError },

    /// The decision callback returned a key missing from its table
    #[error("no branch for decision key '{key}' after node '{node}'")]
    UnresolvedBranch { node: String, key: String },

    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },

    #[error("deadline exceeded ({})", .node.as_deref().unwrap_or("between steps"))]
    DeadlineExceeded { node: Option<String> },

    #[error("run cancelled")]
    Cancelled,
}

impl From<StateError> for RunErrorKind {
    fn from(err: StateError) -> Self {
        match err {
            StateError::UnknownChannel(name) => Self::UnknownChannel(name),
            StateError::TypeMismatch { channel, expected } => {
                Self::TypeMismatch { channel, expected }
            }
        }
    }
}

/// A failed run, with the last state every completed node merged into
#[derive(Debug, Error)]
#[error("run {run_id} failed after {steps} step(s): {kind}")]
pub struct RunError {
    pub run_id: Uuid,
    /// Number of nodes that started executing
    pub steps: usize,
    pub kind: RunErrorKind,
    pub state: GraphState,
}

impl RunError {
    pub fn kind(&self) -> &RunErrorKind {
        &self.kind
    }

    /// State as of the last successful merge
    pub fn last_state(&self) -> &GraphState {
        &self.state
    }

    pub fn into_state(self) -> GraphState {
        self.state
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, RunErrorKind::Cancelled)
    }
}
