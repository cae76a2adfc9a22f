// SPDX-License-Identifier: MIT

use anyhow::Context;
use async_trait::async_trait;
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use tripgraph::config::AppConfig;
use tripgraph::llm::Agent;
use tripgraph::trip::{self, TripPlanner};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file; environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the trip graph for one query
    Plan {
        /// e.g. "What's the weather in Atlanta?"
        #[arg(short, long)]
        query: String,

        /// Continue to travel and food suggestions
        #[arg(short, long)]
        recommendations: bool,
    },
    /// Ask the weather agent directly, outside the graph
    Chat {
        #[arg(short, long)]
        prompt: String,
    },
    /// Print the compiled graph
    Graph {
        #[arg(short, long, value_enum, default_value_t = GraphFormat::Edges)]
        format: GraphFormat,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GraphFormat {
    Edges,
    Json,
}

/// Stands in for the weather agent when only the graph's shape is needed
struct Unconfigured;

#[async_trait]
impl Agent for Unconfigured {
    fn name(&self) -> &str {
        "unconfigured"
    }

    async fn run(&self, _input: String) -> Result<String, Box<dyn Error + Send + Sync>> {
        Err("weather agent is not configured".into())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    match args.command {
        Commands::Plan {
            query,
            recommendations,
        } => {
            let planner = TripPlanner::from_config(&config)?;
            let plan = planner.plan(&query, recommendations).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Chat { prompt } => {
            let agent = trip::weather_agent(&config)?;
            let response = agent.run(prompt).await.map_err(|e| anyhow::anyhow!(e))?;
            println!("{}", response);
        }
        Commands::Graph { format } => {
            let planner = TripPlanner::new(Arc::new(Unconfigured), config.run.clone())?;
            let description = planner.graph().describe();
            match format {
                GraphFormat::Json => println!("{}", serde_json::to_string_pretty(description)?),
                GraphFormat::Edges => {
                    for edge in &description.edges {
                        match &edge.when {
                            Some(key) => println!("{} -[{}]-> {}", edge.from, key, edge.to),
                            None => println!("{} -> {}", edge.from, edge.to),
                        }
                    }
                }
            }
        }
        Commands::Serve { port } => {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(tracing::Level::INFO)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("failed to install tracing subscriber")?;

            let planner = Arc::new(TripPlanner::from_config(&config)?);
            tripgraph::server::serve(planner, port)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
        }
    }

    Ok(())
}
