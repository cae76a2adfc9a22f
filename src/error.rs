// SPDX-License-Identifier: MIT

//! Application-level errors
//!
//! The graph engine has its own error types in [`crate::graph::error`];
//! this module covers the collaborators around it (models, tools, config).

use thiserror::Error;

use crate::graph::{GraphError, RunError};

/// Top-level error type for tripgraph
#[derive(Debug, Error)]
pub enum AppError {
    /// API errors from external services (weather provider, model provider)
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Tool requested by the model is not registered
    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    /// Configuration errors (missing keys, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Caller input rejected before any work was done
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Graph definition error: {0}")]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// Tool loop ran out of turns without a final answer
    #[error("Max {kind} reached: {limit}")]
    MaxIterations { kind: String, limit: u32 },

    #[error("{0}")]
    Other(String),
}

/// Model/LLM-specific errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API key not configured for provider: {0}")]
    ApiKeyMissing(String),

    #[error("Model provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("Rate limit exceeded, retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Invalid response from model: {0}")]
    InvalidResponse(String),
}

impl AppError {
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn tool_not_found(name: impl Into<String>) -> Self {
        Self::ToolNotFound { name: name.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

// Node, tool and model callbacks report boxed errors
impl From<Box<dyn std::error::Error + Send + Sync>> for AppError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err.to_string())
    }
}
