// SPDX-License-Identifier: MIT

//! State graph engine
//!
//! This module threads a shared, channel-based state through a graph of
//! named nodes:
//! - `StateSchema` - declares channels, their initial values and reducers
//! - `StateGraph` - mutable graph definition (nodes, plain and conditional edges)
//! - `CompiledGraph` - validated, immutable plan that runs one `GraphState` per invocation
//!
//! Runs are strictly sequential: one node executes at a time, and the next
//! node is chosen either by a plain edge or by a `Router` looking up its
//! decision key in a static table.

pub mod builder;
pub mod compiler;
pub mod error;
pub mod event;
pub mod executor;
pub mod node;
pub mod schema;
pub mod state;

pub use builder::StateGraph;
pub use compiler::{CompiledGraph, EdgeDescription, GraphConfig, GraphDescription, ValidationMode};
pub use error::{GraphError, RunError, RunErrorKind, StateError};
pub use event::RunEvent;
pub use executor::{RunOptions, DEFAULT_STEPS_PER_NODE};
pub use node::{node_fn, router_fn, FnNode, Node, NodeError, NodeResult, Router};
pub use schema::{Channel, FieldType, Reducer, ReducerType, StateFieldDef, StateSchema};
pub use state::{GraphState, StateUpdate};

/// Pseudo-node every run starts from. Has exactly one outgoing route.
pub const START: &str = "__start__";

/// Terminal marker. Reaching it ends the run successfully.
pub const END: &str = "__end__";
