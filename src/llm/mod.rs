// SPDX-License-Identifier: MIT

//! Chat-model plumbing used by the weather agent
//!
//! - [`Model`]: a chat-completion backend ([`openai::OpenAIModel`])
//! - [`Tool`]: a function the model may call
//! - [`Agent`]: something that turns a text prompt into a text answer
//!   ([`LlmAgent`] runs the model/tool loop)

pub mod agent;
pub mod openai;
pub mod tool;

pub use agent::{Agent, LlmAgent, DEFAULT_MAX_TURNS};
pub use tool::Tool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

use crate::config::ModelConfig;
use crate::error::{AppError, ModelError};

/// Sampling parameters passed through to the provider
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Concatenated text parts
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Part {
    Text(String),
    /// Tool invocation requested by the model
    FunctionCall {
        id: String,
        name: String,
        args: serde_json::Value,
    },
    /// Result of a tool invocation, answering the call with the same id
    FunctionResponse {
        id: String,
        name: String,
        response: serde_json::Value,
    },
}

#[async_trait]
pub trait Model: Send + Sync {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, Box<dyn Error + Send + Sync>>;
}

/// Build the configured model backend
pub fn build_model(config: &ModelConfig) -> Result<Arc<dyn Model>, AppError> {
    log::info!(
        "Using provider: {} with model: {}",
        config.provider,
        config.model_name
    );
    match config.provider.to_ascii_lowercase().as_str() {
        "openai" => Ok(Arc::new(openai::OpenAIModel::new(config)?)),
        other => Err(ModelError::UnsupportedProvider(other.to_string()).into()),
    }
}
