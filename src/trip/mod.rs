// SPDX-License-Identifier: MIT

//! Trip planning: weather lookup, then travel and food suggestions
//!
//! [`TripPlanner`] wires the collaborators from an [`AppConfig`] and owns the
//! compiled graph, which is shared by every run.

pub mod rules;
pub mod weather;
pub mod workflow;

pub use rules::{food_rules, travel_rules, Rule, RuleTable};
pub use weather::{CurrentWeatherTool, WeatherClient, WeatherObservation};
pub use workflow::{build_trip_graph, trip_input, trip_schema, TripPlan};

use std::sync::Arc;

use crate::config::{AppConfig, RunSettings};
use crate::error::AppError;
use crate::graph::{CompiledGraph, GraphState, RunError, RunOptions, StateUpdate};
use crate::llm::{build_model, Agent, GenerationConfig, LlmAgent};

pub struct TripPlanner {
    graph: Arc<CompiledGraph>,
    settings: RunSettings,
}

impl TripPlanner {
    pub fn new(agent: Arc<dyn Agent>, settings: RunSettings) -> Result<Self, AppError> {
        let graph = build_trip_graph(agent, settings.graph_config())?;
        Ok(Self {
            graph: Arc::new(graph),
            settings,
        })
    }

    /// Weather client, model and agent built from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(weather_agent(config)?, config.run.clone())
    }

    pub fn graph(&self) -> &Arc<CompiledGraph> {
        &self.graph
    }

    /// Configured run limits; fields already set in `options` win
    pub fn options(&self, options: RunOptions) -> RunOptions {
        let defaults = self.settings.run_options();
        RunOptions {
            timeout: options.timeout.or(defaults.timeout),
            step_timeout: options.step_timeout.or(defaults.step_timeout),
            ..options
        }
    }

    pub async fn run(&self, input: StateUpdate, options: RunOptions) -> Result<GraphState, RunError> {
        self.graph.invoke_with(input, self.options(options)).await
    }

    pub async fn plan(&self, query: &str, recommendations: bool) -> Result<TripPlan, AppError> {
        if query.trim().is_empty() {
            return Err(AppError::invalid_input("query cannot be empty"));
        }
        let state = self
            .run(trip_input(query, recommendations), RunOptions::default())
            .await?;
        Ok(TripPlan::from(&state))
    }
}

/// The LLM agent behind the `weather_agent` node
pub fn weather_agent(config: &AppConfig) -> Result<Arc<dyn Agent>, AppError> {
    let client = WeatherClient::new(&config.weather)?;
    let model = build_model(&config.model)?;
    let mut agent = LlmAgent::new("weather_agent", workflow::WEATHER_INSTRUCTION, model)
        .with_tool(Arc::new(CurrentWeatherTool::new(client)));
    if config.model.temperature.is_some() {
        agent = agent.with_generation_config(GenerationConfig {
            temperature: config.model.temperature,
            ..GenerationConfig::default()
        });
    }
    Ok(Arc::new(agent))
}
