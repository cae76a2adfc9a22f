// SPDX-License-Identifier: MIT

//! The trip-planning graph
//!
//! ```text
//! START -> weather_agent -[travel]-> travel_agent -> food_agent -> END
//!                        -[end]----> END
//! ```
//!
//! The branch after `weather_agent` follows the caller's `recommendations` flag.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use super::rules::{food_rules, travel_rules, RuleTable};
use crate::error::AppError;
use crate::graph::{
    router_fn, Channel, CompiledGraph, FieldType, GraphConfig, GraphError, GraphState, Node,
    NodeResult, StateGraph, StateSchema, StateUpdate, END, START,
};
use crate::llm::Agent;

pub const QUERY: &str = "query";
pub const RECOMMENDATIONS: &str = "recommendations";
pub const WEATHER: &str = "weather";
pub const RECOMMENDATION: &str = "recommendation";
pub const FOOD: &str = "food";

pub const WEATHER_AGENT: &str = "weather_agent";
pub const TRAVEL_AGENT: &str = "travel_agent";
pub const FOOD_AGENT: &str = "food_agent";

/// Decision keys after `weather_agent`
pub const ROUTE_TRAVEL: &str = "travel";
pub const ROUTE_END: &str = "end";

pub const WEATHER_INSTRUCTION: &str = "You are an AI assistant providing weather information.";

pub fn trip_schema() -> StateSchema {
    StateSchema::new()
        .channel(Channel::new(QUERY).typed(FieldType::String))
        .channel(
            Channel::new(RECOMMENDATIONS)
                .typed(FieldType::Boolean)
                .with_default(json!(false)),
        )
        .channel(Channel::new(WEATHER).typed(FieldType::String))
        .channel(Channel::new(RECOMMENDATION).typed(FieldType::String))
        .channel(Channel::new(FOOD).typed(FieldType::String))
}

/// Input for one trip-planning run
pub fn trip_input(query: impl Into<String>, recommendations: bool) -> StateUpdate {
    StateUpdate::new()
        .set(QUERY, query.into())
        .set(RECOMMENDATIONS, recommendations)
}

fn required_str<'a>(state: &'a GraphState, channel: &str) -> Result<&'a str, AppError> {
    state
        .get_str(channel)
        .ok_or_else(|| AppError::invalid_input(format!("channel '{}' is not set", channel)))
}

/// Asks an agent about the weather for the query
pub struct WeatherAgentNode {
    agent: Arc<dyn Agent>,
    writes: Vec<String>,
}

impl WeatherAgentNode {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            writes: vec![WEATHER.to_string()],
        }
    }
}

#[async_trait]
impl Node for WeatherAgentNode {
    async fn run(&self, state: &GraphState) -> NodeResult {
        let query = required_str(state, QUERY)?;
        log::info!("Weather agent input: {}", query);
        let weather = self.agent.run(query.to_string()).await?;
        log::info!("Weather agent output: {}", weather);
        Ok(StateUpdate::new().set(WEATHER, weather))
    }

    fn writes(&self) -> &[String] {
        &self.writes
    }
}

/// Applies a rule table to one channel and writes the outcome to another
pub struct RuleNode {
    rules: RuleTable,
    reads: &'static str,
    writes: Vec<String>,
}

impl RuleNode {
    pub fn new(rules: RuleTable, reads: &'static str, writes: &'static str) -> Self {
        Self {
            rules,
            reads,
            writes: vec![writes.to_string()],
        }
    }

    /// weather -> recommendation
    pub fn travel() -> Self {
        Self::new(travel_rules(), WEATHER, RECOMMENDATION)
    }

    /// recommendation -> food
    pub fn food() -> Self {
        Self::new(food_rules(), RECOMMENDATION, FOOD)
    }
}

#[async_trait]
impl Node for RuleNode {
    async fn run(&self, state: &GraphState) -> NodeResult {
        let text = required_str(state, self.reads)?;
        let outcome = self.rules.evaluate(text);
        log::info!("{} -> {}: {}", self.reads, self.writes[0], outcome);
        Ok(StateUpdate::new().set(self.writes[0].clone(), outcome))
    }

    fn writes(&self) -> &[String] {
        &self.writes
    }
}

/// Compile the trip graph around the given weather agent
pub fn build_trip_graph(
    agent: Arc<dyn Agent>,
    config: GraphConfig,
) -> Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new(trip_schema());
    graph
        .add_node(WEATHER_AGENT, WeatherAgentNode::new(agent))?
        .add_node(TRAVEL_AGENT, RuleNode::travel())?
        .add_node(FOOD_AGENT, RuleNode::food())?
        .add_edge(START, WEATHER_AGENT)?
        .add_conditional_edges(
            WEATHER_AGENT,
            router_fn(|state: &GraphState| {
                if state.get_bool(RECOMMENDATIONS).unwrap_or(false) {
                    ROUTE_TRAVEL.to_string()
                } else {
                    ROUTE_END.to_string()
                }
            }),
            [(ROUTE_TRAVEL, TRAVEL_AGENT), (ROUTE_END, END)],
        )?
        .add_edge(TRAVEL_AGENT, FOOD_AGENT)?
        .add_edge(FOOD_AGENT, END)?;
    graph.compile_with(config)
}

/// The channels a caller cares about, pulled out of a final state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripPlan {
    pub query: Option<String>,
    pub weather: Option<String>,
    pub recommendation: Option<String>,
    pub food: Option<String>,
}

impl From<&GraphState> for TripPlan {
    fn from(state: &GraphState) -> Self {
        let text = |channel: &str| state.get_str(channel).map(str::to_string);
        Self {
            query: text(QUERY),
            weather: text(WEATHER),
            recommendation: text(RECOMMENDATION),
            food: text(FOOD),
        }
    }
}
