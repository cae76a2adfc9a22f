// SPDX-License-Identifier: MIT

//! Graph definition
//!
//! Nodes and edges may be added in any order; names are resolved when the
//! graph is compiled.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::compiler::{self, CompiledGraph, GraphConfig};
use super::error::GraphError;
use super::node::{Node, Router};
use super::schema::StateSchema;
use super::{END, START};

/// Outgoing route of a node (or of START), before name resolution
pub(crate) enum EdgeDef {
    Plain(String),
    Conditional {
        router: Arc<dyn Router>,
        table: BTreeMap<String, String>,
    },
}

/// Mutable description of a state graph
pub struct StateGraph {
    pub(crate) schema: StateSchema,
    pub(crate) nodes: Vec<(String, Arc<dyn Node>)>,
    pub(crate) edges: Vec<(String, EdgeDef)>,
}

impl StateGraph {
    pub fn new(schema: StateSchema) -> Self {
        Self {
            schema,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Register a node; names must be unique and may not be START or END
    pub fn add_node<N>(&mut self, name: impl Into<String>, node: N) -> Result<&mut Self, GraphError>
    where
        N: Node + 'static,
    {
        self.add_shared_node(name, Arc::new(node))
    }

    /// Register a node that is also held elsewhere
    pub fn add_shared_node(
        &mut self,
        name: impl Into<String>,
        node: Arc<dyn Node>,
    ) -> Result<&mut Self, GraphError> {
        let name = name.into();
        if name == START || name == END {
            return Err(GraphError::ReservedName(name));
        }
        if self.has_node(&name) {
            return Err(GraphError::DuplicateNode(name));
        }
        self.nodes.push((name, node));
        Ok(self)
    }

    /// Add an edge that is always taken after `from` completes
    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<&mut Self, GraphError> {
        let from = from.into();
        let to = to.into();
        if to == START {
            return Err(GraphError::MalformedGraph(format!(
                "edge {} -> {} points back to START",
                from, to
            )));
        }
        self.push_route(from, EdgeDef::Plain(to))?;
        Ok(self)
    }

    /// Add a conditional edge: after `from` completes, `router` picks a key
    /// and `table` maps it to a node name or END. START only takes a plain edge.
    pub fn add_conditional_edges<R, I, K, V>(
        &mut self,
        from: impl Into<String>,
        router: R,
        table: I,
    ) -> Result<&mut Self, GraphError>
    where
        R: Router + 'static,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let from = from.into();
        if from == START {
            return Err(GraphError::MalformedGraph(
                "START must have a single plain edge to its successor".to_string(),
            ));
        }
        let table: BTreeMap<String, String> = table
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        if table.is_empty() {
            return Err(GraphError::MalformedGraph(format!(
                "conditional edge from '{}' has an empty decision table",
                from
            )));
        }
        if let Some((key, _)) = table.iter().find(|(_, to)| to.as_str() == START) {
            return Err(GraphError::MalformedGraph(format!(
                "decision '{}' from '{}' points back to START",
                key, from
            )));
        }

        self.push_route(
            from,
            EdgeDef::Conditional {
                router: Arc::new(router),
                table,
            },
        )?;
        Ok(self)
    }

    /// Validate and freeze with default settings
    pub fn compile(self) -> Result<CompiledGraph, GraphError> {
        self.compile_with(GraphConfig::default())
    }

    pub fn compile_with(self, config: GraphConfig) -> Result<CompiledGraph, GraphError> {
        compiler::compile(self, config)
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.nodes.iter().any(|(n, _)| n == name)
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|(n, _)| n.as_str())
    }

    fn push_route(&mut self, from: String, edge: EdgeDef) -> Result<(), GraphError> {
        if from == END {
            return Err(GraphError::MalformedGraph(
                "END cannot have outgoing edges".to_string(),
            ));
        }
        if self.edges.iter().any(|(f, _)| *f == from) {
            let who = if from == START { "START" } else { from.as_str() };
            return Err(GraphError::MalformedGraph(format!(
                "'{}' already has an outgoing edge",
                who
            )));
        }
        self.edges.push((from, edge));
        Ok(())
    }
}
