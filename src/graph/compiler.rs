// SPDX-License-Identifier: MIT

//! Graph compilation
//!
//! Validates a `StateGraph` and resolves every node name to an index so the
//! executor never looks names up at run time. Checks, in order:
//! 1. declared node writes name schema channels
//! 2. every edge source, destination and decision-table value is a node or END
//! 3. START has an outgoing route
//! 4. every node has an outgoing route
//! 5. every node is reachable from START (fatal in strict mode)

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::builder::{EdgeDef, StateGraph};
use super::error::GraphError;
use super::node::{Node, Router};
use super::schema::StateSchema;
use super::{END, START};

/// What to do with nodes that cannot be reached from START
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Unreachable nodes fail compilation
    #[default]
    Strict,
    /// Unreachable nodes are logged and never run
    Lenient,
}

/// Settings fixed at compile time
#[derive(Debug, Clone, Default)]
pub struct GraphConfig {
    pub validation: ValidationMode,
    /// Step limit per run; defaults to node count x `DEFAULT_STEPS_PER_NODE`
    pub max_steps: Option<usize>,
}

impl GraphConfig {
    pub fn lenient(mut self) -> Self {
        self.validation = ValidationMode::Lenient;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    Node(usize),
    End,
}

pub(crate) enum Route {
    Direct(Target),
    Branch {
        router: Arc<dyn Router>,
        table: HashMap<String, Target>,
    },
}

pub(crate) struct CompiledNode {
    pub name: String,
    pub node: Arc<dyn Node>,
    pub writes: HashSet<String>,
    pub route: Route,
}

/// Validated, immutable graph. Share it behind an `Arc` to run concurrently.
pub struct CompiledGraph {
    pub(crate) schema: Arc<StateSchema>,
    pub(crate) nodes: Vec<CompiledNode>,
    pub(crate) entry: Route,
    pub(crate) config: GraphConfig,
    description: GraphDescription,
}

impl CompiledGraph {
    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Serializable outline of channels, nodes and edges
    pub fn describe(&self) -> &GraphDescription {
        &self.description
    }

    pub(crate) fn target_name(&self, target: Target) -> &str {
        match target {
            Target::Node(i) => &self.nodes[i].name,
            Target::End => END,
        }
    }
}

/// Channel as shown by [`CompiledGraph::describe`]
#[derive(Debug, Clone, Serialize)]
pub struct ChannelDescription {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    pub reducer: &'static str,
    pub has_default: bool,
}

/// One edge, or one row of a decision table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeDescription {
    pub from: String,
    pub to: String,
    /// Decision key for conditional edges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphDescription {
    pub channels: Vec<ChannelDescription>,
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeDescription>,
}

pub(crate) fn compile(graph: StateGraph, config: GraphConfig) -> Result<CompiledGraph, GraphError> {
    let StateGraph {
        schema,
        nodes,
        edges,
    } = graph;

    let index: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (name.clone(), i))
        .collect();

    for (name, node) in &nodes {
        if let Some(channel) = node.writes().iter().find(|c| !schema.contains(c)) {
            return Err(GraphError::UnknownChannel {
                node: name.clone(),
                channel: channel.clone(),
            });
        }
    }

    let resolve = |from: &str, to: &str, when: Option<&str>| -> Result<Target, GraphError> {
        if to == END {
            return Ok(Target::End);
        }
        index
            .get(to)
            .map(|&i| Target::Node(i))
            .ok_or_else(|| GraphError::UnknownNodeReference {
                edge: edge_label(from, to, when),
                name: to.to_string(),
            })
    };

    let mut routes: HashMap<String, Route> = HashMap::new();
    let mut description_edges = Vec::new();
    for (from, edge) in edges {
        if from != START && !index.contains_key(&from) {
            let to = match &edge {
                EdgeDef::Plain(to) => to.clone(),
                EdgeDef::Conditional { .. } => "...".to_string(),
            };
            return Err(GraphError::UnknownNodeReference {
                edge: edge_label(&from, &to, None),
                name: from,
            });
        }

        let route = match edge {
            EdgeDef::Plain(to) => {
                let target = resolve(&from, &to, None)?;
                description_edges.push(EdgeDescription {
                    from: from.clone(),
                    to,
                    when: None,
                });
                Route::Direct(target)
            }
            EdgeDef::Conditional { router, table } => {
                let mut resolved = HashMap::with_capacity(table.len());
                for (key, to) in table {
                    let target = resolve(&from, &to, Some(key.as_str()))?;
                    description_edges.push(EdgeDescription {
                        from: from.clone(),
                        to,
                        when: Some(key.clone()),
                    });
                    resolved.insert(key, target);
                }
                Route::Branch {
                    router,
                    table: resolved,
                }
            }
        };
        routes.insert(from, route);
    }

    let entry = routes.remove(START).ok_or_else(|| {
        GraphError::MalformedGraph("START has no outgoing edge".to_string())
    })?;

    if let Some((name, _)) = nodes.iter().find(|(name, _)| !routes.contains_key(name)) {
        return Err(GraphError::MalformedGraph(format!(
            "node '{}' has no outgoing edge",
            name
        )));
    }

    let unreachable = unreachable_nodes(&entry, &routes, &nodes);
    if !unreachable.is_empty() {
        match config.validation {
            ValidationMode::Strict => return Err(GraphError::UnreachableNode(unreachable)),
            ValidationMode::Lenient => {
                for name in &unreachable {
                    log::warn!("Node '{}' is unreachable from START and will never run", name);
                }
            }
        }
    }

    let description = GraphDescription {
        channels: schema
            .channels()
            .map(|c| ChannelDescription {
                name: c.name().to_string(),
                field_type: c.field_type().map(|t| t.to_string()),
                reducer: c.reducer().name(),
                has_default: c.has_initial_value(),
            })
            .collect(),
        nodes: nodes.iter().map(|(n, _)| n.clone()).collect(),
        edges: description_edges,
    };

    let compiled_nodes = nodes
        .into_iter()
        .map(|(name, node)| {
            let route = routes.remove(&name).ok_or_else(|| {
                GraphError::MalformedGraph(format!("node '{}' has no outgoing edge", name))
            })?;
            let writes = node.writes().iter().cloned().collect();
            Ok(CompiledNode {
                name,
                node,
                writes,
                route,
            })
        })
        .collect::<Result<Vec<_>, GraphError>>()?;

    log::info!(
        "Compiled graph with {} nodes and {} channels",
        compiled_nodes.len(),
        schema.len()
    );

    Ok(CompiledGraph {
        schema: Arc::new(schema),
        nodes: compiled_nodes,
        entry,
        config,
        description,
    })
}

fn edge_label(from: &str, to: &str, when: Option<&str>) -> String {
    let from = if from == START { "START" } else { from };
    let to = if to == END { "END" } else { to };
    match when {
        Some(key) => format!("{} -[{}]-> {}", from, key, to),
        None => format!("{} -> {}", from, to),
    }
}

/// Breadth-first walk from START; returns node names never visited, in registration order
fn unreachable_nodes(
    entry: &Route,
    routes: &HashMap<String, Route>,
    nodes: &[(String, Arc<dyn Node>)],
) -> Vec<String> {
    let mut seen = vec![false; nodes.len()];
    let mut queue: VecDeque<usize> = VecDeque::new();

    let mut visit = |route: &Route, queue: &mut VecDeque<usize>| {
        let targets: Vec<Target> = match route {
            Route::Direct(t) => vec![*t],
            Route::Branch { table, .. } => table.values().copied().collect(),
        };
        for target in targets {
            if let Target::Node(i) = target {
                if !seen[i] {
                    seen[i] = true;
                    queue.push_back(i);
                }
            }
        }
    };

    visit(entry, &mut queue);
    while let Some(i) = queue.pop_front() {
        if let Some(route) = routes.get(&nodes[i].0) {
            visit(route, &mut queue);
        }
    }

    nodes
        .iter()
        .zip(seen)
        .filter(|(_, reached)| !reached)
        .map(|((name, _), _)| name.clone())
        .collect()
}
