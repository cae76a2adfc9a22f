// SPDX-License-Identifier: MIT

//! tripgraph: a state-graph workflow engine and the weather/travel/food
//! trip planner built on it.

pub mod config;
pub mod error;
pub mod graph;
pub mod llm;
pub mod server;
pub mod trip;

pub use error::{AppError, ModelError};
